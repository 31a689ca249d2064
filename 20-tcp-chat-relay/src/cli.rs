use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::protocol::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Relay chat lines between every connected client.
    Server(ServerArgs),
    /// Connect to a relay and chat from the terminal.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Socket address to listen on. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:12345")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Host name or IP of the relay. Prompted for when omitted.
    #[arg(long)]
    pub server: Option<String>,

    /// Port the relay listens on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Display name other clients see. Prompted for when omitted.
    #[arg(long)]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults_to_the_well_known_port() {
        let cli = Cli::try_parse_from(["tcp_chat_relay", "server"]).expect("parse");
        let Command::Server(args) = cli.command else {
            panic!("expected server command");
        };
        assert_eq!(args.listen.port(), DEFAULT_PORT);
    }

    #[test]
    fn client_flags_are_optional() {
        let cli = Cli::try_parse_from(["tcp_chat_relay", "client"]).expect("parse");
        let Command::Client(args) = cli.command else {
            panic!("expected client command");
        };
        assert_eq!(args.server, None);
        assert_eq!(args.name, None);
        assert_eq!(args.port, DEFAULT_PORT);
    }

    #[test]
    fn client_accepts_all_flags() {
        let cli = Cli::try_parse_from([
            "tcp_chat_relay",
            "client",
            "--server",
            "127.0.0.1",
            "--port",
            "4000",
            "--name",
            "alice",
        ])
        .expect("parse");
        let Command::Client(args) = cli.command else {
            panic!("expected client command");
        };
        assert_eq!(args.server.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, 4000);
        assert_eq!(args.name.as_deref(), Some("alice"));
    }
}
