// Centralized constants for imagectl to avoid magic strings

/// Frontend identifier the backend uses to select its Dockerfile frontend
pub const DOCKERFILE_FRONTEND: &str = "dockerfile.v0";

/// Dockerfile name used when no --file flag is given
pub const DEFAULT_DOCKERFILE_NAME: &str = "Dockerfile";

/// Registry domain assumed for references without an explicit domain
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Namespace prepended to single-component official repositories
pub const OFFICIAL_REPO_NAMESPACE: &str = "library";

/// Tag assumed for references carrying neither a tag nor a digest
pub const DEFAULT_TAG: &str = "latest";

/// Capacity of the bounded progress event channel
pub const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Default backend address when neither --addr nor IMAGECTL_ADDR is set
pub const DEFAULT_BACKEND_ADDR: &str = "http://127.0.0.1:8372";
