//! Line-oriented console driver.
//!
//! Each input line is one command. `fetch` and `count` stay live: changes
//! arriving later are pushed to the notice channel until the next query of
//! the same kind replaces them.

use std::sync::Arc;

use shopcart_cart::application::query_handlers::get_cart_by_id;
use shopcart_cart::domain::commands::{AddArticle, CartCommand, RemoveArticle, StartCart};
use shopcart_summary::projection::CartSummaryProjection;
use shopcart_summary::subscriber::SummarySubscriber;
use shopcart_summary::summary::{CartSummary, CountSummaries, FetchSummaries, SummaryFilter};
use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Page size used by `fetch` when no limit is given.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Help text listing the console commands.
pub const HELP: &str = "\
commands:
  start <cart> <customer>
  add <cart> <article>
  remove <cart> <article>
  show <cart>
  fetch [prefix] [offset] [limit]
  count [prefix]
  help
  quit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start a cart.
    Start {
        /// Cart identifier.
        cart_id: String,
        /// Customer owning the cart.
        customer: String,
    },
    /// Add an article to a cart.
    Add {
        /// Cart identifier.
        cart_id: String,
        /// Article identifier.
        article: String,
    },
    /// Remove an article from a cart.
    Remove {
        /// Cart identifier.
        cart_id: String,
        /// Article identifier.
        article: String,
    },
    /// Show a cart rebuilt from its events.
    Show {
        /// Cart identifier.
        cart_id: String,
    },
    /// Page through summaries and follow changes.
    Fetch {
        /// Cart id prefix.
        prefix: String,
        /// Rows to skip.
        offset: usize,
        /// Maximum rows to return.
        limit: usize,
    },
    /// Count summaries and follow changes.
    Count {
        /// Cart id prefix.
        prefix: String,
    },
    /// Print the command list.
    Help,
    /// End the session.
    Quit,
}

fn expect_args<'a>(name: &str, args: &[&'a str], usage: &str) -> Result<Vec<&'a str>, AppError> {
    let wanted = usage.split_whitespace().filter(|w| w.starts_with('<')).count();
    if args.len() == wanted {
        Ok(args.to_vec())
    } else {
        Err(AppError::Console(format!("usage: {name} {usage}")))
    }
}

fn parse_number(value: &str, what: &str) -> Result<usize, AppError> {
    value.parse().map_err(|_| {
        AppError::Console(format!("{what} must be a non-negative number, got {value:?}"))
    })
}

/// Parses one console line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns `AppError::Console` for unknown commands or wrong arguments.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, AppError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name.to_ascii_lowercase().as_str() {
        "start" => {
            let a = expect_args("start", &args, "<cart> <customer>")?;
            ConsoleCommand::Start {
                cart_id: a[0].to_owned(),
                customer: a[1].to_owned(),
            }
        }
        "add" => {
            let a = expect_args("add", &args, "<cart> <article>")?;
            ConsoleCommand::Add {
                cart_id: a[0].to_owned(),
                article: a[1].to_owned(),
            }
        }
        "remove" => {
            let a = expect_args("remove", &args, "<cart> <article>")?;
            ConsoleCommand::Remove {
                cart_id: a[0].to_owned(),
                article: a[1].to_owned(),
            }
        }
        "show" => {
            let a = expect_args("show", &args, "<cart>")?;
            ConsoleCommand::Show {
                cart_id: a[0].to_owned(),
            }
        }
        "fetch" => {
            if args.len() > 3 {
                return Err(AppError::Console(
                    "usage: fetch [prefix] [offset] [limit]".to_owned(),
                ));
            }
            ConsoleCommand::Fetch {
                prefix: args.first().map_or_else(String::new, |p| (*p).to_owned()),
                offset: args.get(1).map_or(Ok(0), |v| parse_number(v, "offset"))?,
                limit: args
                    .get(2)
                    .map_or(Ok(DEFAULT_PAGE_SIZE), |v| parse_number(v, "limit"))?,
            }
        }
        "count" => {
            if args.len() > 1 {
                return Err(AppError::Console("usage: count [prefix]".to_owned()));
            }
            ConsoleCommand::Count {
                prefix: args.first().map_or_else(String::new, |p| (*p).to_owned()),
            }
        }
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => {
            return Err(AppError::Console(format!(
                "unknown command {other:?}, try help"
            )));
        }
    };
    Ok(Some(command))
}

/// Reads the next console line. Returns `None` at end of input.
///
/// # Errors
///
/// Returns `AppError::Io` if the input cannot be read or is not UTF-8.
pub async fn read_line<R>(lines: &mut Lines<R>) -> Result<Option<String>, AppError>
where
    R: AsyncBufRead + Unpin,
{
    Ok(lines.next_line().await?)
}

/// Result of executing a console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to print.
    Output(String),
    /// The session should end.
    Quit,
}

/// Formats a summary row for display.
#[must_use]
pub fn render_row(row: &CartSummary) -> String {
    format!("{} {} [{}]", row.id, row.customer, row.items.join(", "))
}

/// One console session: a caller context for live summary queries.
#[derive(Debug)]
pub struct Console {
    projection: Arc<CartSummaryProjection>,
    subscriber: SummarySubscriber,
    notices: mpsc::UnboundedSender<String>,
    fetch_watch: Option<JoinHandle<()>>,
    count_watch: Option<JoinHandle<()>>,
}

impl Console {
    /// Creates a session reading from `projection` and pushing live updates
    /// to `notices`.
    #[must_use]
    pub fn new(
        projection: Arc<CartSummaryProjection>,
        notices: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            subscriber: SummarySubscriber::new(Arc::clone(&projection)),
            projection,
            notices,
            fetch_watch: None,
            count_watch: None,
        }
    }

    /// Executes one command against `state`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Domain` if a cart command is rejected, or
    /// `AppError::Projection` if a summary query fails.
    pub async fn execute(
        &mut self,
        state: &AppState,
        command: ConsoleCommand,
    ) -> Result<Reply, AppError> {
        let output = match command {
            ConsoleCommand::Start { cart_id, customer } => {
                let command = CartCommand::Start(StartCart {
                    correlation_id: Uuid::new_v4(),
                    cart_id: cart_id.clone(),
                    customer: customer.clone(),
                });
                state.execute(&command).await?;
                format!("cart {cart_id} started for {customer}")
            }
            ConsoleCommand::Add { cart_id, article } => {
                let command = CartCommand::AddArticle(AddArticle {
                    correlation_id: Uuid::new_v4(),
                    cart_id: cart_id.clone(),
                    article: article.clone(),
                });
                state.execute(&command).await?;
                format!("added {article} to {cart_id}")
            }
            ConsoleCommand::Remove { cart_id, article } => {
                let command = CartCommand::RemoveArticle(RemoveArticle {
                    correlation_id: Uuid::new_v4(),
                    cart_id: cart_id.clone(),
                    article: article.clone(),
                });
                let result = state.execute(&command).await?;
                if result.stored_events.is_empty() {
                    format!("{article} was not in {cart_id}")
                } else {
                    format!("removed {article} from {cart_id}")
                }
            }
            ConsoleCommand::Show { cart_id } => {
                let view = get_cart_by_id(&cart_id, state.event_repository.as_ref()).await?;
                format!(
                    "{} {} v{} [{}]",
                    view.cart_id,
                    view.customer,
                    view.version,
                    view.items.join(", ")
                )
            }
            ConsoleCommand::Fetch {
                prefix,
                offset,
                limit,
            } => self.fetch(prefix, offset, limit).await?,
            ConsoleCommand::Count { prefix } => self.count(prefix).await?,
            ConsoleCommand::Help => HELP.to_owned(),
            ConsoleCommand::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Output(output))
    }

    async fn fetch(
        &mut self,
        prefix: String,
        offset: usize,
        limit: usize,
    ) -> Result<String, AppError> {
        let query = FetchSummaries {
            offset,
            limit,
            filter: SummaryFilter::starting_with(prefix),
        };
        let result = self.subscriber.fetch(&query).await?;

        let mut updates = result.updates;
        let notices = self.notices.clone();
        let watch = tokio::spawn(async move {
            while let Some(row) = updates.recv().await {
                if notices.send(format!("update: {}", render_row(&row))).is_err() {
                    break;
                }
            }
            debug!("fetch watch ended");
        });
        if let Some(previous) = self.fetch_watch.replace(watch) {
            previous.abort();
        }

        let mut lines = vec![format!("{} cart(s)", result.initial_result.len())];
        lines.extend(result.initial_result.iter().map(render_row));
        Ok(lines.join("\n"))
    }

    async fn count(&mut self, prefix: String) -> Result<String, AppError> {
        let query = CountSummaries {
            filter: SummaryFilter::starting_with(prefix),
        };
        let result = self.subscriber.count(&query).await?;

        let mut updates = result.updates;
        let notices = self.notices.clone();
        let projection = Arc::clone(&self.projection);
        let watch = tokio::spawn(async move {
            while updates.recv().await.is_some() {
                let line = match projection.count(&query).await {
                    Ok(response) => format!("count: {}", response.count),
                    Err(e) => {
                        warn!(error = %e, "count refresh failed");
                        continue;
                    }
                };
                if notices.send(line).is_err() {
                    break;
                }
            }
            debug!("count watch ended");
        });
        if let Some(previous) = self.count_watch.replace(watch) {
            previous.abort();
        }

        let response = result.initial_result;
        Ok(format!(
            "count: {} (as of {})",
            response.count,
            response.as_of.to_rfc3339()
        ))
    }

    /// Cancels the live queries of this session.
    pub fn shutdown(&mut self) {
        self.subscriber.shutdown();
        for watch in [self.fetch_watch.take(), self.count_watch.take()]
            .into_iter()
            .flatten()
        {
            watch.abort();
        }
    }
}
