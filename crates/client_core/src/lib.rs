pub mod controller;
pub mod error;
pub mod poller;
pub mod remote;
pub mod session;
pub mod tracks;
pub mod workspace;

pub use controller::{LoadTarget, WorkspaceConfig, WorkspaceController, WorkspaceUpdate};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use poller::{NotificationPoller, NotificationSink, PollerHandle, NOTIFICATION_POLL_INTERVAL};
pub use remote::{HttpRemoteService, RemoteService, ServiceConfig, TrackCatalog};
pub use session::{Session, SessionStore};
pub use tracks::TrackDirectory;
pub use workspace::{ReviewDraft, ReviewPhase, ReviewState, Workspace, WorkspaceSnapshot};
