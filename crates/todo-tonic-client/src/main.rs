#![doc = include_str!("../README.md")]

use anyhow::anyhow;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use todo_tonic_core::{
    proto::{
        CreateToDoRequest, DeleteToDoRequest, ReadAllRequest, ReadToDoRequest, ToDo,
        UpdateToDoRequest, to_do_service_client::ToDoServiceClient,
    },
    types::{reminder_from_wire, reminder_to_wire},
};
use tonic::{Status, codec::CompressionEncoding};

#[derive(Parser, Debug)]
#[command(
    name = "todo-tonic-client",
    version,
    about = "Command-line client for the to-do gRPC service"
)]
struct Cli {
    /// Server URI.
    ///
    /// Environment variable: `TODO_ENDPOINT`
    #[arg(long, env = "TODO_ENDPOINT", default_value_t = String::from("http://127.0.0.1:50051"))]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Create an item and print its id.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value_t = String::new())]
        description: String,
        /// RFC 3339 timestamp. Defaults to now.
        #[arg(long, value_parser = parse_reminder)]
        reminder: Option<DateTime<Utc>>,
    },
    /// Print a single item.
    Read { id: i64 },
    /// Print every item.
    List,
    /// Replace the title, description and reminder of an item.
    Update {
        id: i64,
        #[arg(long)]
        title: String,
        #[arg(long, default_value_t = String::new())]
        description: String,
        /// RFC 3339 timestamp. Defaults to now.
        #[arg(long, value_parser = parse_reminder)]
        reminder: Option<DateTime<Utc>>,
    },
    /// Delete an item.
    Delete { id: i64 },
}

fn parse_reminder(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}

fn item(id: i64, title: String, description: String, reminder: Option<DateTime<Utc>>) -> ToDo {
    ToDo {
        id,
        title,
        description,
        reminder: Some(reminder_to_wire(&reminder.unwrap_or_else(Utc::now))),
    }
}

fn describe(to_do: &ToDo) -> String {
    let reminder = reminder_from_wire(to_do.reminder.as_ref())
        .map(|at| at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_else(|_| "-".to_string());
    format!(
        "{:>6} | {:<30} | {:<25} | {}",
        to_do.id, to_do.title, reminder, to_do.description
    )
}

fn rpc_error(status: Status) -> anyhow::Error {
    anyhow!("{:?}: {}", status.code(), status.message())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut client = ToDoServiceClient::connect(cli.endpoint)
        .await?
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd);

    match cli.command {
        Command::Create {
            title,
            description,
            reminder,
        } => {
            let res = client
                .create(CreateToDoRequest {
                    to_do: Some(item(0, title, description, reminder)),
                })
                .await
                .map_err(rpc_error)?;
            println!("created {}", res.into_inner().id);
        }
        Command::Read { id } => {
            let res = client
                .read(ReadToDoRequest { id })
                .await
                .map_err(rpc_error)?;
            if let Some(to_do) = res.into_inner().to_do {
                println!("{}", describe(&to_do));
            }
        }
        Command::List => {
            let res = client
                .read_all(ReadAllRequest {})
                .await
                .map_err(rpc_error)?;
            for to_do in res.into_inner().to_do {
                println!("{}", describe(&to_do));
            }
        }
        Command::Update {
            id,
            title,
            description,
            reminder,
        } => {
            client
                .update(UpdateToDoRequest {
                    to_do: Some(item(id, title, description, reminder)),
                })
                .await
                .map_err(rpc_error)?;
            println!("updated {id}");
        }
        Command::Delete { id } => {
            client
                .delete(DeleteToDoRequest { id })
                .await
                .map_err(rpc_error)?;
            println!("deleted {id}");
        }
    }

    Ok(())
}
