//! Transport abstraction between a client and the server.

use crate::{
    error::Result, PullRequest, PullResponse, PushRequest, PushResponse, SharedServer,
};

/// Carries pull and push requests to the server.
///
/// An implementation must return either a well-formed response or an error;
/// on error the client makes no progress and leaves its cursors untouched, so
/// the whole sync can be retried.
pub trait SyncTransport: Send + Sync {
    /// Pulls changes from the server.
    fn pull(&self, request: &PullRequest) -> Result<PullResponse>;

    /// Pushes changes to the server.
    fn push(&self, request: &PushRequest) -> Result<PushResponse>;
}

impl SyncTransport for SharedServer {
    fn pull(&self, request: &PullRequest) -> Result<PullResponse> {
        Ok(self.lock().handle_pull(request))
    }

    fn push(&self, request: &PushRequest) -> Result<PushResponse> {
        Ok(self.lock().handle_push(request))
    }
}

impl<T: SyncTransport + ?Sized> SyncTransport for &T {
    fn pull(&self, request: &PullRequest) -> Result<PullResponse> {
        (**self).pull(request)
    }

    fn push(&self, request: &PushRequest) -> Result<PushResponse> {
        (**self).push(request)
    }
}

impl<T: SyncTransport + ?Sized> SyncTransport for Box<T> {
    fn pull(&self, request: &PullRequest) -> Result<PullResponse> {
        (**self).pull(request)
    }

    fn push(&self, request: &PushRequest) -> Result<PushResponse> {
        (**self).push(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Server, SyncStatus};

    #[test]
    fn shared_server_transport_round_trip() {
        let shared = SharedServer::new(Server::new("server"));
        shared.lock().create("a", "n", "1").unwrap();

        let pulled = shared.pull(&PullRequest { since: 0 }).unwrap();
        assert_eq!(pulled.records.len(), 1);

        let pushed = shared
            .push(&PushRequest {
                records: pulled.records,
            })
            .unwrap();
        assert_eq!(pushed.status, SyncStatus::Ok);
        assert_eq!(pushed.server_counter, 2);
    }

    #[test]
    fn boxed_transport_delegates() {
        let shared = SharedServer::new(Server::new("server"));
        let boxed: Box<dyn SyncTransport> = Box::new(shared.clone());
        let response = boxed.pull(&PullRequest { since: 0 }).unwrap();
        assert_eq!(response.server_counter, 0);
    }
}
