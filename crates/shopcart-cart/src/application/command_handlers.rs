//! Command handlers for the shopping cart.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: load aggregate, execute command, persist events.

use shopcart_core::aggregate::AggregateRoot;
use shopcart_core::clock::Clock;
use shopcart_core::error::DomainError;
use shopcart_core::event::DomainEvent;
use shopcart_core::repository::{EventRepository, StoredEvent};

use crate::domain::aggregates::ShoppingCart;
use crate::domain::commands::{AddArticle, RemoveArticle, StartCart};
use crate::domain::events::CartEvent;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct CartCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: String,
    /// The stored events produced and persisted. Empty when the command was
    /// a no-op.
    pub stored_events: Vec<StoredEvent>,
}

/// Reconstitutes a `ShoppingCart` from stored events.
///
/// Replay never re-validates: every stored event is applied as-is.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    cart_id: &str,
    existing_events: &[StoredEvent],
) -> Result<ShoppingCart, DomainError> {
    let mut cart = ShoppingCart::new(cart_id);
    for stored in existing_events {
        let event = CartEvent::from_stored(stored)?;
        cart.apply(&event);
    }
    Ok(cart)
}

/// Persists the cart's uncommitted events at its committed version.
async fn commit(
    cart: &mut ShoppingCart,
    repo: &dyn EventRepository,
) -> Result<CartCommandResult, DomainError> {
    let stored_events: Vec<StoredEvent> = cart
        .uncommitted_events()
        .iter()
        .map(DomainEvent::to_stored)
        .collect();

    if !stored_events.is_empty() {
        repo.append_events(&cart.id, cart.version(), &stored_events)
            .await?;
        cart.clear_uncommitted_events();
    }

    Ok(CartCommandResult {
        aggregate_id: cart.id.clone(),
        stored_events,
    })
}

/// Loads an existing cart, failing if it has no history.
async fn load_existing(
    cart_id: &str,
    repo: &dyn EventRepository,
) -> Result<ShoppingCart, DomainError> {
    let existing_events = repo.load_events(cart_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(cart_id.to_owned()));
    }
    reconstitute(cart_id, &existing_events)
}

/// Handles the `StartCart` command: replays any prior history, starts the
/// cart, and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty cart id or customer,
/// `DomainError::AggregateAlreadyExists` if the cart was already started, or
/// any error from event loading or appending.
pub async fn handle_start_cart(
    command: &StartCart,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CartCommandResult, DomainError> {
    let existing_events = repo.load_events(&command.cart_id).await?;
    let mut cart = reconstitute(&command.cart_id, &existing_events)?;

    cart.start(&command.customer, command.correlation_id, clock)?;

    commit(&mut cart, repo).await
}

/// Handles the `AddArticle` command: loads the aggregate, adds the article,
/// and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the cart does not exist,
/// `DomainError::Validation` for an empty article,
/// `DomainError::DuplicateArticle` if the article is already in the cart, or
/// any error from event loading or appending.
pub async fn handle_add_article(
    command: &AddArticle,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CartCommandResult, DomainError> {
    let mut cart = load_existing(&command.cart_id, repo).await?;

    cart.add_article(&command.article, command.correlation_id, clock)?;

    commit(&mut cart, repo).await
}

/// Handles the `RemoveArticle` command: loads the aggregate, removes the
/// article if present, and persists the resulting event. Nothing is appended
/// when the article is absent.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the cart does not exist, or
/// any error from event loading or appending.
pub async fn handle_remove_article(
    command: &RemoveArticle,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<CartCommandResult, DomainError> {
    let mut cart = load_existing(&command.cart_id, repo).await?;

    cart.remove_article(&command.article, command.correlation_id, clock)?;

    commit(&mut cart, repo).await
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use shopcart_core::error::DomainError;
    use shopcart_core::repository::StoredEvent;
    use shopcart_test_support::{
        EmptyEventRepository, FailingEventRepository, FixedClock, RecordingEventRepository,
    };
    use uuid::Uuid;

    use crate::application::command_handlers::{
        handle_add_article, handle_remove_article, handle_start_cart, reconstitute,
    };
    use crate::domain::commands::{AddArticle, RemoveArticle, StartCart};
    use crate::domain::events::{
        ARTICLE_ADDED_EVENT_TYPE, ArticleAdded, CART_STARTED_EVENT_TYPE, CartEventKind,
        CartStarted,
    };

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn stored(cart_id: &str, sequence_number: i64, kind: &CartEventKind) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: cart_id.to_owned(),
            event_type: kind.event_type().to_owned(),
            payload: serde_json::to_value(kind).unwrap(),
            sequence_number,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: fixed_now(),
        }
    }

    fn started_event(cart_id: &str) -> StoredEvent {
        stored(
            cart_id,
            1,
            &CartEventKind::Started(CartStarted {
                cart_id: cart_id.to_owned(),
                customer: "alice".to_owned(),
            }),
        )
    }

    fn added_event(cart_id: &str, sequence_number: i64, article: &str) -> StoredEvent {
        stored(
            cart_id,
            sequence_number,
            &CartEventKind::ArticleAdded(ArticleAdded {
                cart_id: cart_id.to_owned(),
                article: article.to_owned(),
                price: 0.0,
            }),
        )
    }

    #[tokio::test]
    async fn test_handle_start_cart_persists_started_event() {
        // Arrange
        let correlation_id = Uuid::new_v4();
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let command = StartCart {
            correlation_id,
            cart_id: "C1".to_owned(),
            customer: "alice".to_owned(),
        };

        // Act
        let result = handle_start_cart(&command, &clock, &repo).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.aggregate_id, "C1");
        assert_eq!(cmd_result.stored_events.len(), 1);

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);

        let (agg_id, expected_version, events) = &appended[0];
        assert_eq!(agg_id, "C1");
        assert_eq!(*expected_version, 0);
        assert_eq!(events.len(), 1);

        let stored = &events[0];
        assert_eq!(stored.event_type, CART_STARTED_EVENT_TYPE);
        assert_eq!(stored.sequence_number, 1);
        assert_eq!(stored.correlation_id, correlation_id);
        assert_eq!(stored.occurred_at, fixed_now());

        let payload: CartEventKind = serde_json::from_value(stored.payload.clone()).unwrap();
        match payload {
            CartEventKind::Started(started) => {
                assert_eq!(started.cart_id, "C1");
                assert_eq!(started.customer, "alice");
            }
            other => panic!("expected Started payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_start_cart_rejects_empty_customer_without_appending() {
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(Vec::new()));
        let command = StartCart {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            customer: String::new(),
        };

        let result = handle_start_cart(&command, &clock, &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_start_cart_rejects_empty_cart_id() {
        let clock = FixedClock(fixed_now());
        let repo = EmptyEventRepository;
        let command = StartCart {
            correlation_id: Uuid::new_v4(),
            cart_id: String::new(),
            customer: "alice".to_owned(),
        };

        let result = handle_start_cart(&command, &clock, &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_start_cart_rejects_restart_of_existing_cart() {
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(vec![started_event("C1")]));
        let command = StartCart {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            customer: "bob".to_owned(),
        };

        let result = handle_start_cart(&command, &clock, &repo).await;

        match result {
            Err(DomainError::AggregateAlreadyExists(id)) => assert_eq!(id, "C1"),
            other => panic!("expected AggregateAlreadyExists, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_add_article_persists_article_added_event() {
        // Arrange
        let correlation_id = Uuid::new_v4();
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(vec![started_event("C1")]));
        let command = AddArticle {
            correlation_id,
            cart_id: "C1".to_owned(),
            article: "sku-1".to_owned(),
        };

        // Act
        let result = handle_add_article(&command, &clock, &repo).await;

        // Assert
        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.stored_events.len(), 1);

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);

        let (agg_id, expected_version, events) = &appended[0];
        assert_eq!(agg_id, "C1");
        assert_eq!(*expected_version, 1);

        let stored = &events[0];
        assert_eq!(stored.event_type, ARTICLE_ADDED_EVENT_TYPE);
        assert_eq!(stored.sequence_number, 2);
        assert_eq!(stored.correlation_id, correlation_id);
        assert_eq!(stored.causation_id, correlation_id);
    }

    #[tokio::test]
    async fn test_handle_add_article_returns_duplicate_when_already_present() {
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(vec![
            started_event("C1"),
            added_event("C1", 2, "sku-1"),
        ]));
        let command = AddArticle {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            article: "sku-1".to_owned(),
        };

        let result = handle_add_article(&command, &clock, &repo).await;

        match result {
            Err(DomainError::DuplicateArticle { cart_id, article }) => {
                assert_eq!(cart_id, "C1");
                assert_eq!(article, "sku-1");
            }
            other => panic!("expected DuplicateArticle, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_add_article_returns_error_when_cart_not_found() {
        let clock = FixedClock(fixed_now());
        let repo = EmptyEventRepository;
        let command = AddArticle {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            article: "sku-1".to_owned(),
        };

        let result = handle_add_article(&command, &clock, &repo).await;

        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, "C1"),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_remove_article_persists_article_removed_event() {
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(vec![
            started_event("C1"),
            added_event("C1", 2, "sku-1"),
        ]));
        let command = RemoveArticle {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            article: "sku-1".to_owned(),
        };

        let result = handle_remove_article(&command, &clock, &repo).await;

        assert_eq!(result.unwrap().stored_events.len(), 1);
        let appended = repo.appended_events();
        let (_, expected_version, events) = &appended[0];
        assert_eq!(*expected_version, 2);
        assert_eq!(events[0].sequence_number, 3);
        let payload: CartEventKind = serde_json::from_value(events[0].payload.clone()).unwrap();
        match payload {
            CartEventKind::ArticleRemoved(removed) => assert_eq!(removed.article, "sku-1"),
            other => panic!("expected ArticleRemoved payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_remove_absent_article_appends_nothing() {
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Ok(vec![started_event("C1")]));
        let command = RemoveArticle {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            article: "sku-1".to_owned(),
        };

        let result = handle_remove_article(&command, &clock, &repo).await;

        let cmd_result = result.unwrap();
        assert_eq!(cmd_result.aggregate_id, "C1");
        assert!(cmd_result.stored_events.is_empty());
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_remove_article_returns_error_when_cart_not_found() {
        let clock = FixedClock(fixed_now());
        let command = RemoveArticle {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            article: "sku-1".to_owned(),
        };

        let result = handle_remove_article(&command, &clock, &EmptyEventRepository).await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[tokio::test]
    async fn test_handlers_propagate_repository_failures() {
        let clock = FixedClock(fixed_now());
        let command = StartCart {
            correlation_id: Uuid::new_v4(),
            cart_id: "C1".to_owned(),
            customer: "alice".to_owned(),
        };

        let result = handle_start_cart(&command, &clock, &FailingEventRepository).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[test]
    fn test_reconstitute_rejects_undecodable_payload() {
        let mut event = started_event("C1");
        event.payload = serde_json::json!({"unexpected": true});

        let result = reconstitute("C1", &[event]);

        match result {
            Err(DomainError::Infrastructure(msg)) => {
                assert!(msg.contains("deserialization"));
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }
}
