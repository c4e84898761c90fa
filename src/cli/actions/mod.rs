pub mod server;

/// Action to execute after CLI parsing.
pub enum Action {
    Server(Box<server::Args>),
}

impl Action {
    /// Run the action.
    ///
    /// # Errors
    /// Propagates the underlying action's failure.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Server(args) => server::execute(*args).await,
        }
    }
}
