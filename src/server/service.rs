use std::io;
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use tracing::warn;

use super::request::parse_request;
use super::response::{status_reason, write_final, HeaderScratch};
use crate::context::FinalResponse;
use crate::dispatcher::Dispatcher;

/// `may_minihttp` service running every request through a [`Dispatcher`].
///
/// Cloned once per connection; clones share the dispatcher and start with
/// empty header scratch space.
pub struct AppService {
    dispatcher: Arc<Dispatcher>,
    scratch: HeaderScratch,
}

impl Clone for AppService {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.dispatcher))
    }
}

impl AppService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            scratch: HeaderScratch::default(),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        // The previous response on this connection has been encoded by now.
        self.scratch.clear();
        let parts = match parse_request(req) {
            Ok(parts) => parts,
            Err(err) => {
                warn!(error = %err, "Rejecting unparsable request");
                res.status_code(400, status_reason(400));
                return Ok(());
            }
        };
        let reply: FinalResponse = self.dispatcher.handle(parts);
        // SAFETY: `may_minihttp` encodes `res` as soon as this call returns,
        // before the next `call` clears the scratch or the connection drops
        // this service.
        #[allow(unsafe_code)]
        unsafe {
            write_final(res, reply, &mut self.scratch);
        }
        Ok(())
    }
}
