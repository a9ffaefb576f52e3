use tokio::sync::watch;

/// Port for the network reachability signal
pub trait NetworkStatus: Send + Sync {
    /// Whether the remote API is currently believed reachable
    fn is_online(&self) -> bool;

    /// Receiver that observes every reachability change
    fn watch(&self) -> watch::Receiver<bool>;
}
