use std::sync::Arc;
use tokio::sync::Mutex;

use crate::oracle::Oracle;
use crate::report::ReportComposer;
use crate::session::UploadSession;

/// One upload session shared by every request. The lock is held across a
/// whole batch or report so only one of them runs at a time.
pub struct ServerState {
    pub(crate) session: Mutex<UploadSession>,
    pub(crate) oracle: Arc<dyn Oracle>,
    pub(crate) composer: ReportComposer,
}

impl ServerState {
    pub fn new(oracle: Arc<dyn Oracle>, composer: ReportComposer) -> Self {
        Self {
            session: Mutex::new(UploadSession::new()),
            oracle,
            composer,
        }
    }
}
