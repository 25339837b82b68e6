//! Commands for the shopping cart.

use shopcart_core::command::Command;
use uuid::Uuid;

/// Command to start a new shopping cart.
#[derive(Debug, Clone)]
pub struct StartCart {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart identifier, assigned by the caller.
    pub cart_id: String,
    /// The customer owning the cart.
    pub customer: String,
}

/// Command to add an article to a cart.
#[derive(Debug, Clone)]
pub struct AddArticle {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart identifier.
    pub cart_id: String,
    /// The article identifier.
    pub article: String,
}

/// Command to remove an article from a cart.
#[derive(Debug, Clone)]
pub struct RemoveArticle {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The cart identifier.
    pub cart_id: String,
    /// The article identifier.
    pub article: String,
}

/// Any command the cart aggregate accepts.
#[derive(Debug, Clone)]
pub enum CartCommand {
    /// Start a cart.
    Start(StartCart),
    /// Add an article.
    AddArticle(AddArticle),
    /// Remove an article.
    RemoveArticle(RemoveArticle),
}

impl Command for StartCart {
    fn command_type(&self) -> &'static str {
        "cart.start"
    }

    fn target_aggregate_id(&self) -> &str {
        &self.cart_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for AddArticle {
    fn command_type(&self) -> &'static str {
        "cart.add_article"
    }

    fn target_aggregate_id(&self) -> &str {
        &self.cart_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for RemoveArticle {
    fn command_type(&self) -> &'static str {
        "cart.remove_article"
    }

    fn target_aggregate_id(&self) -> &str {
        &self.cart_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

impl Command for CartCommand {
    fn command_type(&self) -> &'static str {
        match self {
            Self::Start(command) => command.command_type(),
            Self::AddArticle(command) => command.command_type(),
            Self::RemoveArticle(command) => command.command_type(),
        }
    }

    fn target_aggregate_id(&self) -> &str {
        match self {
            Self::Start(command) => command.target_aggregate_id(),
            Self::AddArticle(command) => command.target_aggregate_id(),
            Self::RemoveArticle(command) => command.target_aggregate_id(),
        }
    }

    fn correlation_id(&self) -> Uuid {
        match self {
            Self::Start(command) => command.correlation_id,
            Self::AddArticle(command) => command.correlation_id,
            Self::RemoveArticle(command) => command.correlation_id,
        }
    }
}

impl From<StartCart> for CartCommand {
    fn from(command: StartCart) -> Self {
        Self::Start(command)
    }
}

impl From<AddArticle> for CartCommand {
    fn from(command: AddArticle) -> Self {
        Self::AddArticle(command)
    }
}

impl From<RemoveArticle> for CartCommand {
    fn from(command: RemoveArticle) -> Self {
        Self::RemoveArticle(command)
    }
}
