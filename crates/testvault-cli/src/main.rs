// TestVault CLI - Command-line client for saved test artifacts

mod client;
mod render;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use testvault_core::{NewTestArtifact, NewVersion};
use uuid::Uuid;

use client::{ApiClient, GenerateRequest};

const DEFAULT_SERVER: &str = "http://localhost:8080";
const SERVER_ENV: &str = "TESTVAULT_URL";
const TOKEN_ENV: &str = "TESTVAULT_TOKEN";

/// TestVault - Versioned storage for generated tests
#[derive(Parser)]
#[command(name = "testvault")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server base URL (defaults to $TESTVAULT_URL, then http://localhost:8080)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Session token (defaults to $TESTVAULT_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved artifacts, most recently updated first
    List {
        /// Only show artifacts for this file
        #[arg(short, long)]
        file_path: Option<String>,
    },
    /// Print the code of one version (the current one by default)
    Show {
        id: Uuid,

        /// Version index to print
        #[arg(short = 'n', long = "index")]
        index: Option<usize>,
    },
    /// Show the version history of an artifact
    History { id: Uuid },
    /// Save test code as a new artifact
    Save {
        /// Repository path of the file under test
        file_path: String,

        /// File containing the test code ("-" reads stdin)
        #[arg(short, long)]
        code_file: String,

        /// Test framework label (server default: Jest)
        #[arg(short, long)]
        framework: Option<String>,

        #[arg(short, long)]
        summary: Option<String>,
    },
    /// Append a new version to an artifact
    Append {
        id: Uuid,

        /// File containing the test code ("-" reads stdin)
        #[arg(short, long)]
        code_file: String,

        #[arg(short, long)]
        summary: Option<String>,
    },
    /// Restore an earlier version by appending a copy of it
    Restore {
        id: Uuid,

        /// Index of the version to restore
        #[arg(allow_hyphen_values = true)]
        index: i64,
    },
    /// Delete an artifact and its whole history
    Delete { id: Uuid },
    /// Generate test code for a source file
    Generate {
        /// Repository path of the file under test
        file_path: String,

        /// Test case summary to generate from
        #[arg(short, long)]
        summary: String,

        #[arg(short, long)]
        framework: Option<String>,

        /// Source file contents (defaults to reading FILE_PATH)
        #[arg(long)]
        content_file: Option<String>,

        /// Save the generated code as a new artifact
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = connect(cli.server, cli.token).and_then(|client| run(&client, cli.command));

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn connect(server: Option<String>, token: Option<String>) -> Result<ApiClient> {
    let server = resolve_setting(server, std::env::var(SERVER_ENV).ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let token = resolve_setting(token, std::env::var(TOKEN_ENV).ok()).ok_or_else(|| {
        anyhow!(
            "No session token. Pass --token or set {} to the token issued at sign-in.",
            TOKEN_ENV
        )
    })?;
    Ok(ApiClient::new(&server, &token))
}

/// An explicit flag wins over the environment; blank values count as unset.
fn resolve_setting(flag: Option<String>, env: Option<String>) -> Option<String> {
    flag.into_iter()
        .chain(env)
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn run(client: &ApiClient, command: Commands) -> Result<()> {
    match command {
        Commands::List { file_path } => {
            let artifacts = client.list(file_path.as_deref())?;
            render::print_list(&artifacts);
        }
        Commands::Show { id, index } => {
            let artifact = client.get(id)?;
            render::print_version(&artifact, index)?;
        }
        Commands::History { id } => {
            render::print_history(&client.get(id)?);
        }
        Commands::Save {
            file_path,
            code_file,
            framework,
            summary,
        } => {
            let artifact = client.create(&NewTestArtifact {
                file_path,
                framework,
                code: read_code(&code_file)?,
                summary,
            })?;
            render::print_saved("Artifact saved", &artifact);
        }
        Commands::Append {
            id,
            code_file,
            summary,
        } => {
            let version = NewVersion {
                code: read_code(&code_file)?,
                summary,
            };
            let artifact = client.append(id, &version)?;
            render::print_saved("Version appended", &artifact);
        }
        Commands::Restore { id, index } => {
            let artifact = client.restore(id, index)?;
            render::print_saved(&format!("Version {} restored", index), &artifact);
        }
        Commands::Delete { id } => {
            client.delete(id)?;
            println!("Deleted {}", id);
        }
        Commands::Generate {
            file_path,
            summary,
            framework,
            content_file,
            save,
        } => {
            let source = content_file.as_deref().unwrap_or(&file_path);
            let request = GenerateRequest {
                file_content: read_code(source)?,
                file_path,
                framework,
                summary,
            };
            if save {
                let artifact = client.generate_and_save(&request)?;
                render::print_saved("Generated and saved", &artifact);
            } else {
                println!("{}", client.generate_code(&request)?);
            }
        }
    }
    Ok(())
}

/// Reads code from a file, or from stdin when `path` is `-`.
fn read_code(path: &str) -> Result<String> {
    if path == "-" {
        let mut code = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut code)
            .map_err(|e| anyhow!("Failed to read stdin: {}", e))?;
        return Ok(code);
    }
    std::fs::read_to_string(path).map_err(|e| anyhow!("Failed to read '{}': {}", path, e))
}
