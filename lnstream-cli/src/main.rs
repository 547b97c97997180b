use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{HeaderMap, HeaderValue, Uri};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::traits::ToRpcParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use lnstreamd::config::RPC_SERVER_ENDPOINT;
use lnstreamd::rpc_server::{
    PaymentPrepareRequest, PaymentSendRequest, RpcMethods, StreamAddRequest, StreamIdRequest,
    StreamStartRequest,
};
use lnstreamd::stream::{StartDefaults, StreamParams, TotalParts};
use lnstreamd::util::get_rpc_credentials;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(
        short = 'u',
        long,
        help = "rpc server endpoint",
        default_value_t = Uri::from_static(RPC_SERVER_ENDPOINT),
        value_parser
    )]
    rpc_uri: Uri,

    #[clap(
        long,
        help = "rpc server admin username",
        value_parser,
        required_unless_present = "rpc_cookie",
        requires = "rpc_password"
    )]
    rpc_user: Option<String>,

    #[clap(
        long,
        help = "rpc server admin password",
        value_parser,
        required_unless_present = "rpc_cookie",
        requires = "rpc_user"
    )]
    rpc_password: Option<String>,

    #[clap(long, help = "rpc server admin cookie file path", value_parser)]
    rpc_cookie: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

impl Cli {
    /// Get the base64 encoded credentials for the Authorization header
    fn get_auth_header_value(&self) -> anyhow::Result<String> {
        let (username, password) = get_rpc_credentials(
            self.rpc_user.clone(),
            self.rpc_password.clone(),
            self.rpc_cookie.clone(),
        )
        .context("getting rpc credentials")?;

        let raw_value = format!("{}:{}", username, password);
        Ok(STANDARD.encode(raw_value.as_bytes()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Node, relay and stream summary
    #[clap(name = "info")]
    Info,
    /// Version of the daemon
    #[clap(name = "version")]
    Version,
    /// Manage payment streams
    #[clap(name = "stream", subcommand)]
    Stream(StreamCommands),
    /// Pay a single invoice
    #[clap(name = "payment", subcommand)]
    Payment(PaymentCommands),
}

#[derive(Debug, Subcommand)]
enum StreamCommands {
    /// register a stream, paused
    #[clap(name = "add")]
    Add {
        id: String,
        #[clap(long)]
        name: Option<String>,
        #[clap(flatten)]
        fields: StreamFields,
    },
    /// start or resume a stream, registering it first if the fields are complete
    #[clap(name = "start")]
    Start {
        id: String,
        #[clap(flatten)]
        fields: StreamFields,
    },
    /// pause a stream after the part in flight
    #[clap(name = "pause")]
    Pause { id: String },
    /// end a stream and forget it
    #[clap(name = "end")]
    End { id: String },
    /// show a stream
    #[clap(name = "status")]
    Status { id: String },
    /// show all streams
    #[clap(name = "list")]
    List,
}

#[derive(Debug, Args)]
struct StreamFields {
    /// satoshi per part
    #[clap(long)]
    price: Option<u64>,
    /// identity pubkey of the receiving node
    #[clap(long)]
    destination: Option<String>,
    /// number of parts to pay
    #[clap(long, conflicts_with = "infinite")]
    parts: Option<u64>,
    /// pay until the stream is ended
    #[clap(long)]
    infinite: bool,
    /// parts already paid
    #[clap(long)]
    current_part: Option<u64>,
    /// milliseconds between a settled part and the next
    #[clap(long)]
    delay_ms: Option<u64>,
    #[clap(long)]
    memo: Option<String>,
}

impl StreamFields {
    fn total_parts(&self) -> Option<TotalParts> {
        if self.infinite {
            Some(TotalParts::Infinite)
        } else {
            self.parts.map(TotalParts::Finite)
        }
    }

    fn into_defaults(self) -> StartDefaults {
        StartDefaults {
            total_parts: self.total_parts(),
            price: self.price,
            current_part: self.current_part,
            delay_ms: self.delay_ms,
            destination: self.destination,
            memo: self.memo,
        }
    }

    fn into_params(self) -> anyhow::Result<StreamParams> {
        let mut defaults = self.into_defaults();
        defaults.current_part.get_or_insert(0);
        defaults
            .to_params()
            .context("--price, --destination, --delay-ms and --parts or --infinite are required")
    }
}

#[derive(Debug, Subcommand)]
enum PaymentCommands {
    /// decode an invoice before paying it
    #[clap(name = "prepare")]
    Prepare { payment_request: String },
    /// pay an invoice
    #[clap(name = "send")]
    Send {
        payment_request: String,
        /// satoshi, for invoices without an amount
        #[clap(long)]
        amount: Option<u64>,
    },
}

struct RpcRequestClient {
    client: HttpClient,
}

impl RpcRequestClient {
    pub fn new(uri: &Uri, auth_header_value: Option<&str>) -> anyhow::Result<Self> {
        let mut client_builder = HttpClientBuilder::default();
        if let Some(value) = auth_header_value {
            let mut headers = HeaderMap::new();
            let header_value = HeaderValue::from_str(&format!("Basic {}", value))
                .context("can't convert value to auth header")?;
            headers.insert("Authorization", header_value);
            client_builder = client_builder.set_headers(headers);
        };
        let client =
            client_builder.build(uri.to_string()).context("can't create rpc http client")?;
        Ok(Self { client })
    }

    pub async fn request<P: ToRpcParams + Send>(
        &self,
        method: RpcMethods,
        params: P,
    ) -> anyhow::Result<serde_json::Value> {
        let response = self.client.request(method.as_str(), params).await;

        Ok(response?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // install global collector configured based on RUST_LOG env var.
    tracing_subscriber::fmt::init();
    let args = Cli::parse();
    let auth_header_value = args.get_auth_header_value()?;
    let rpc_client = RpcRequestClient::new(&args.rpc_uri, Some(&auth_header_value))?;

    let response = match args.command {
        Commands::Info => rpc_client.request(RpcMethods::Info, rpc_params![]).await?,
        Commands::Version => rpc_client.request(RpcMethods::Version, rpc_params![]).await?,
        Commands::Stream(command) => match command {
            StreamCommands::Add { id, name, fields } => {
                let params = StreamAddRequest { id, name, params: fields.into_params()? };
                rpc_client.request(RpcMethods::StreamAdd, params).await?
            }
            StreamCommands::Start { id, fields } => {
                let params = StreamStartRequest { id, defaults: fields.into_defaults() };
                rpc_client.request(RpcMethods::StreamStart, params).await?
            }
            StreamCommands::Pause { id } =>
                rpc_client.request(RpcMethods::StreamPause, StreamIdRequest { id }).await?,
            StreamCommands::End { id } =>
                rpc_client.request(RpcMethods::StreamEnd, StreamIdRequest { id }).await?,
            StreamCommands::Status { id } =>
                rpc_client.request(RpcMethods::StreamStatus, StreamIdRequest { id }).await?,
            StreamCommands::List =>
                rpc_client.request(RpcMethods::StreamList, rpc_params![]).await?,
        },
        Commands::Payment(command) => match command {
            PaymentCommands::Prepare { payment_request } => {
                let params = PaymentPrepareRequest { payment_request };
                rpc_client.request(RpcMethods::PaymentPrepare, params).await?
            }
            PaymentCommands::Send { payment_request, amount } => {
                let params = PaymentSendRequest { payment_request, amount };
                rpc_client.request(RpcMethods::PaymentSend, params).await?
            }
        },
    };

    if !response.is_null() {
        println!("{}", serde_json::to_string_pretty(&response)?)
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, PaymentCommands, StreamCommands};
    use clap::Parser;
    use lnstreamd::stream::TotalParts;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const AUTH: [&str; 2] = ["--rpc-user=user", "--rpc-password=password"];

    fn parse(command: &[&str]) -> Cli {
        let mut args = vec!["lnstream-cli"];
        args.extend(AUTH);
        args.extend(command);
        Cli::parse_from(args)
    }

    #[test]
    fn test_cli() {
        let args = vec!["lnstream-cli", "--rpc-user=user", "--rpc-password=password", "info"];
        let cli = Cli::parse_from(args);
        assert!(matches!(cli.command, Commands::Info));
    }

    #[test]
    fn test_fail_without_username() {
        let args = vec!["lnstream-cli", "info"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_err())
    }

    /// Test that the cli can be parsed with a cookie file
    #[test]
    fn test_cli_cookie() {
        let cookie_file = NamedTempFile::new().unwrap();
        cookie_file.as_file().write_all(b"user:password").unwrap();
        let path = cookie_file.path().to_str().unwrap();

        let args = vec!["lnstream-cli", "--rpc-cookie", path, "info"];

        let cli = Cli::parse_from(args);
        assert!(matches!(cli.command, Commands::Info));

        let auth_header = cli.get_auth_header_value().unwrap();
        assert_eq!(auth_header, "dXNlcjpwYXNzd29yZA==");
    }

    /// Test that parsing fails if username is passed without password
    #[test]
    fn test_fail_without_password() {
        let args = vec!["lnstream-cli", "--rpc-user=user", "info"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_err())
    }

    #[test]
    fn test_stream_add() {
        let cli = parse(&[
            "stream",
            "add",
            "s1",
            "--price=10",
            "--destination=02abc",
            "--parts=5",
            "--delay-ms=1000",
        ]);
        let Commands::Stream(StreamCommands::Add { id, name, fields }) = cli.command else {
            panic!("expected stream add");
        };
        assert_eq!(id, "s1");
        assert_eq!(name, None);
        let params = fields.into_params().unwrap();
        assert_eq!(params.price, 10);
        assert_eq!(params.total_parts, TotalParts::Finite(5));
        assert_eq!(params.current_part, 0);
        assert_eq!(params.destination, "02abc");
    }

    #[test]
    fn test_stream_add_incomplete() {
        let cli = parse(&["stream", "add", "s1", "--price=10", "--infinite"]);
        let Commands::Stream(StreamCommands::Add { fields, .. }) = cli.command else {
            panic!("expected stream add");
        };
        assert!(fields.into_params().is_err());
    }

    #[test]
    fn test_stream_parts_conflict() {
        let mut args = vec!["lnstream-cli"];
        args.extend(AUTH);
        args.extend(["stream", "start", "s1", "--parts=3", "--infinite"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_stream_start_defaults() {
        let cli = parse(&["stream", "start", "s1", "--infinite", "--price=2"]);
        let Commands::Stream(StreamCommands::Start { id, fields }) = cli.command else {
            panic!("expected stream start");
        };
        assert_eq!(id, "s1");
        let defaults = fields.into_defaults();
        assert_eq!(defaults.total_parts, Some(TotalParts::Infinite));
        assert_eq!(defaults.price, Some(2));
        assert_eq!(defaults.destination, None);
    }

    #[test]
    fn test_payment_send() {
        let cli = parse(&["payment", "send", "lnbc1", "--amount=21"]);
        assert!(matches!(
            cli.command,
            Commands::Payment(PaymentCommands::Send { ref payment_request, amount: Some(21) })
                if payment_request == "lnbc1"
        ));
    }
}
