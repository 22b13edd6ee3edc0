use pressroom_archive::Package;
use pressroom_storage::Location;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

/// Opaque download identifier handed to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactId(Uuid);
impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}
impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0.simple())
    }
}
impl FromStr for ArtifactId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A finished package waiting to be downloaded.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub id: ArtifactId,
    pub location: Location,
    pub filename: String,
    pub content_type: &'static str,
    pub size: u64,
    pub members: usize,
    pub created: Instant,
}
impl Artifact {
    pub fn new(package: Package) -> Self {
        Self {
            id: ArtifactId::new(),
            location: package.location,
            filename: package.filename,
            content_type: package.content_type,
            size: package.size,
            members: package.members,
            created: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: std::time::Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= ttl
    }
}
