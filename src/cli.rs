use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::models::approval::RequestStatus;
use crate::models::user::ActorTier;

/// labstock: lab chemical inventory with emailed approvals
#[derive(Parser)]
#[command(name = "labstock", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to LABSTOCK_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage approver accounts
    Actor {
        #[command(subcommand)]
        command: ActorCommands,
    },

    /// Inspect approval requests
    Request {
        #[command(subcommand)]
        command: RequestCommands,
    },

    /// Decode capability links
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum ActorCommands {
    /// Create an approved admin or super-admin account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// admin | super-admin
        #[arg(long, default_value = "admin")]
        tier: ActorTier,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// List approval requests, optionally filtered by status
    List {
        /// pending | admin-approved | approved | denied
        #[arg(long)]
        status: Option<RequestStatus>,
    },
    /// Re-send approval links to the tier a request is waiting on
    Notify {
        /// Request ID
        id: Uuid,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Verify a capability token and print its claims
    Inspect {
        /// Raw token or a full approval link
        token: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_create_parses_tier() {
        let cli = Cli::try_parse_from([
            "labstock", "actor", "create", "--name", "Root", "--email", "root@lab.org",
            "--password", "pw", "--tier", "super-admin",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Actor {
                command: ActorCommands::Create { tier, .. },
            }) => assert_eq!(tier, ActorTier::SuperAdmin),
            _ => panic!("expected actor create"),
        }
    }

    #[test]
    fn test_request_notify_takes_an_id() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from(["labstock", "request", "notify", &id.to_string()]).unwrap();
        match cli.command {
            Some(Commands::Request {
                command: RequestCommands::Notify { id: parsed },
            }) => assert_eq!(parsed, id),
            _ => panic!("expected request notify"),
        }
        assert!(Cli::try_parse_from(["labstock", "request", "notify", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_request_list_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["labstock", "request", "list", "--status", "open"]).is_err());
    }
}
