//! LedgerKV CLI Client
//!
//! Command-line interface for interacting with LedgerKV.

use clap::{Parser, Subcommand};
use ledgerkv::contract::generate_asset_id;
use ledgerkv::network::Client;
use ledgerkv::protocol::{Command, Response, Status};

/// LedgerKV CLI
#[derive(Parser, Debug)]
#[command(name = "ledgerkv-cli")]
#[command(about = "CLI for the LedgerKV versioned key-value ledger")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Insert or overwrite a key
    Set {
        key: String,
        value: String,
    },

    /// Overwrite a key that must already exist
    Update {
        key: String,
        value: String,
    },

    /// Delete a key
    Del {
        key: String,
    },

    /// Check whether a key is live
    Exists {
        key: String,
    },

    /// List live records in [start, end)
    Scan {
        #[arg(long, default_value = "")]
        start: String,

        #[arg(long, default_value = "")]
        end: String,
    },

    /// Show every write made to a key
    History {
        key: String,
    },

    /// Seed the sample accreditations
    Init,

    /// Create an accreditation with status Applied
    Create {
        /// Asset id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        clinic: String,

        #[arg(long)]
        doctor: String,

        #[arg(long)]
        speciality: String,
    },

    /// Change the status of an accreditation
    Status {
        id: String,
        status: String,
    },

    /// Run any contract transaction by name
    Invoke {
        function: String,
        args: Vec<String>,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    let command = match args.command {
        Commands::Get { key } => Command::Get { key: key.into_bytes() },
        Commands::Set { key, value } => Command::Put {
            key: key.into_bytes(),
            value: value.into_bytes(),
        },
        Commands::Update { key, value } => Command::Update {
            key: key.into_bytes(),
            value: value.into_bytes(),
        },
        Commands::Del { key } => Command::Delete { key: key.into_bytes() },
        Commands::Exists { key } => Command::Exists { key: key.into_bytes() },
        Commands::Scan { start, end } => Command::Range {
            start: start.into_bytes(),
            end: end.into_bytes(),
        },
        Commands::History { key } => Command::History { key: key.into_bytes() },
        Commands::Init => invoke("InitLedger", vec![]),
        Commands::Create {
            id,
            clinic,
            doctor,
            speciality,
        } => {
            let id = id.unwrap_or_else(generate_asset_id);
            println!("{}", id);
            invoke(
                "CreateAsset",
                vec![id, clinic, doctor, "Applied".to_string(), speciality],
            )
        }
        Commands::Status { id, status } => invoke("UpdateStatus", vec![id, status]),
        Commands::Invoke { function, args } => invoke(&function, args),
        Commands::Ping => Command::Ping,
    };

    let response =
        Client::connect(args.server.as_str()).and_then(|mut client| client.request(&command));

    match response {
        Ok(response) => std::process::exit(print_response(&response)),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

fn invoke(function: &str, args: Vec<String>) -> Command {
    Command::Invoke {
        function: function.to_string(),
        args,
    }
}

/// Print a response and return the process exit code
fn print_response(response: &Response) -> i32 {
    match response.status {
        Status::Ok => {
            match &response.payload {
                Some(_) => println!("{}", response.text()),
                None => println!("OK"),
            }
            0
        }
        Status::NotFound | Status::InvalidKey | Status::Error => {
            eprintln!("{:?}: {}", response.status, response.text());
            1
        }
    }
}
