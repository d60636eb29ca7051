use std::fmt::Write as _;

use board::{BoardConfig, BoardController, ColumnState, Counts, HttpBoardSource, Record};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid filter `{0}`; expected field=value")]
    InvalidFilter(String),
    #[error("stage `{0}` is not one of --stages")]
    UnknownStage(String),
    #[error("{id} is not among the loaded items of `{stage}`")]
    NotLoaded { id: String, stage: String },
    #[error("server rejected moving {id} to `{stage}`; board rolled back")]
    MoveRejected { id: String, stage: String },
}

#[derive(Parser, Debug)]
#[command(name = "crm-cli", about = "CRM API and pipeline board CLI")]
struct Cli {
    #[arg(long, env = "CRM_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Log board and HTTP activity to stderr.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Api(ApiCommand),
    Board(BoardCommand),
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    List {
        resource: String,
        /// Field filter as `field=value`; repeatable.
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        search: Option<String>,
    },
    Get {
        resource: String,
        id: String,
    },
    Create {
        resource: String,
        #[arg(long)]
        data: String,
    },
    Update {
        resource: String,
        id: String,
        #[arg(long)]
        data: String,
    },
    Delete {
        resource: String,
        id: String,
    },
}

#[derive(Args, Debug)]
struct BoardCommand {
    #[command(subcommand)]
    command: BoardSubcommand,
}

#[derive(Subcommand, Debug)]
enum BoardSubcommand {
    Show(BoardArgs),
    Move {
        #[command(flatten)]
        board: BoardArgs,
        id: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Position in the destination column; defaults to the top.
        #[arg(long)]
        index: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct BoardArgs {
    resource: String,
    #[arg(long, value_delimiter = ',', required = true)]
    stages: Vec<String>,
    #[arg(long, default_value = "stage")]
    field: String,
    #[arg(long, default_value_t = board::DEFAULT_PAGE_SIZE)]
    limit: u32,
    #[arg(long)]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CliContext { base_url: cli.base_url };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Api(api) => run_api(&ctx, api).await,
        Command::Board(board) => run_board(&ctx, board).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            status: status.as_u16(),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_api(cli: &CliContext, api: ApiCommand) -> Result<(), CliError> {
    let json = match api.command {
        ApiSubcommand::List {
            resource,
            filters,
            page,
            limit,
            search,
        } => {
            let mut query = filters
                .iter()
                .map(|raw| parse_filter(raw))
                .collect::<Result<Vec<_>, _>>()?;
            query.extend(page.map(|page| ("page".to_owned(), page.to_string())));
            query.extend(limit.map(|limit| ("limit".to_owned(), limit.to_string())));
            query.extend(search.map(|search| ("search".to_owned(), search)));
            api_request(cli, reqwest::Method::GET, &[resource.as_str()], &query, None).await?
        }
        ApiSubcommand::Get { resource, id } => {
            api_request(cli, reqwest::Method::GET, &[resource.as_str(), id.as_str()], &[], None).await?
        }
        ApiSubcommand::Create { resource, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            api_request(cli, reqwest::Method::POST, &[resource.as_str()], &[], Some(body)).await?
        }
        ApiSubcommand::Update { resource, id, data } => {
            let body = serde_json::from_str::<Value>(&data)?;
            api_request(cli, reqwest::Method::PUT, &[resource.as_str(), id.as_str()], &[], Some(body)).await?
        }
        ApiSubcommand::Delete { resource, id } => {
            api_request(cli, reqwest::Method::DELETE, &[resource.as_str(), id.as_str()], &[], None).await?
        }
    };
    print_json(&json)
}

async fn run_board(cli: &CliContext, command: BoardCommand) -> Result<(), CliError> {
    match command.command {
        BoardSubcommand::Show(args) => {
            let board = open_board(cli, &args).await;
            print!("{}", render_board(&board.columns(), &board.counts()));
            Ok(())
        }
        BoardSubcommand::Move {
            board: args,
            id,
            from,
            to,
            index,
        } => {
            for stage in [&from, &to] {
                if !args.stages.contains(stage) {
                    return Err(CliError::UnknownStage(stage.clone()));
                }
            }
            let board = open_board(cli, &args).await;
            let loaded = board
                .column(&from)
                .is_some_and(|column| column.items.iter().any(|record| record.id == id));
            if !loaded {
                return Err(CliError::NotLoaded { id, stage: from });
            }

            board.move_across(&id, &from, &to, index).await;

            print!("{}", render_board(&board.columns(), &board.counts()));
            let landed = board
                .column(&to)
                .is_some_and(|column| column.items.iter().any(|record| record.id == id));
            if !landed {
                return Err(CliError::MoveRejected { id, stage: to });
            }
            Ok(())
        }
    }
}

async fn open_board(cli: &CliContext, args: &BoardArgs) -> BoardController<Record, HttpBoardSource> {
    let source = HttpBoardSource::new(&cli.base_url, &args.resource, &args.field);
    source.set_search(args.search.as_deref());
    let config = BoardConfig::new(args.stages.iter().cloned()).with_page_size(args.limit);
    let board = BoardController::new(config, source);
    board.initialize_board().await;
    board
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    segments: &[&str],
    query: &[(String, String)],
    body: Option<Value>,
) -> Result<Value, CliError> {
    let client = reqwest::Client::new();
    let url = api_url(&cli.base_url, segments)?;

    let request = client.request(method, url).query(query);
    let request = if let Some(json) = body {
        request.json(&json)
    } else {
        request
    };

    let response = request.send().await?;
    let status = response.status();
    let value = response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError {
            status: status.as_u16(),
            message: value.to_string(),
        });
    }

    Ok(value)
}

/// `{base_url}/api/{segments..}` with each segment percent-encoded, so ids
/// containing `/`, `?` or `#` stay one path segment.
fn api_url(base_url: &str, segments: &[&str]) -> Result<reqwest::Url, CliError> {
    let invalid = || CliError::InvalidBaseUrl(base_url.to_owned());
    let mut url = reqwest::Url::parse(base_url).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push("api")
        .extend(segments);
    Ok(url)
}

fn parse_filter(raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => Ok((field.trim().to_owned(), value.to_owned())),
        _ => Err(CliError::InvalidFilter(raw.to_owned())),
    }
}

/// Fields tried in order for a one-line card label.
const LABEL_FIELDS: &[&str] = &["title", "name", "company", "subject", "fullName", "productName", "email"];

fn label(record: &Record) -> String {
    LABEL_FIELDS
        .iter()
        .find_map(|field| record.field(field).and_then(Value::as_str))
        .unwrap_or("")
        .to_owned()
}

fn render_board(columns: &[(String, ColumnState<Record>)], counts: &Counts) -> String {
    let mut out = String::new();
    for (stage, column) in columns {
        let total = counts.get(stage).copied().unwrap_or(column.total);
        let _ = writeln!(out, "== {stage} ({total}) ==");
        for record in &column.items {
            let _ = writeln!(out, "  {}  {}", record.id, label(record));
        }
        if column.has_next {
            let _ = writeln!(out, "  +{} more", total.saturating_sub(column.items.len() as u64));
        }
    }
    out
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
