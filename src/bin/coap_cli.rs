//! Command-line request front end.
//!
//! ```text
//! coap-cli GET coap://localhost:5683/time
//! coap-cli PUT coap://localhost:5683/tmp Lorem ipsum
//! coap-cli PING localhost
//! ```

use std::time::Duration;

use clap::Parser;

use coap_tcp::core::message::{code, code_name, Message};
use coap_tcp::error::{ProtocolError, Result};
use coap_tcp::service::client::Client;
use coap_tcp::utils::{logging, uri};

#[derive(Parser)]
#[command(name = "coap-cli")]
#[command(about = "CoAP-over-TCP request tool", long_about = None)]
struct Cli {
    /// Request method: GET, POST, PUT, DELETE, or PING
    method: String,

    /// Target, e.g. coap://localhost:5683/time
    url: String,

    /// Payload words, joined with spaces
    payload: Vec<String>,

    /// Content format (0 text/plain, 41 xml, 42 octet-stream, 50 json)
    #[arg(long)]
    cf: Option<u16>,

    /// Max age in seconds
    #[arg(long, default_value_t = 60)]
    max_age: u32,

    /// Receive timeout in milliseconds (default: wait forever)
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    logging::init("warn");

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("{error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let target = uri::parse(&cli.url)?;

    let mut client = Client::connect(&target.authority).await?;
    if let Some(ms) = cli.timeout_ms {
        client = client.with_recv_timeout(Duration::from_millis(ms));
    }

    if cli.method.eq_ignore_ascii_case("PING") {
        client.ping().await?;
        println!("pong");
        return client.close().await;
    }

    let mut request = Message::new(
        parse_method(&cli.method)?,
        Vec::new(),
        cli.payload.join(" ").into_bytes(),
    );
    request.uri_path = target.path.clone();
    request.content_format = cli.cf;
    request.max_age = cli.max_age;

    let response = client.invoke(request).await?;
    eprintln!("{}", code_name(response.code));
    if !response.payload.is_empty() {
        println!("{}", String::from_utf8_lossy(&response.payload));
    }

    client.close().await
}

fn parse_method(method: &str) -> Result<u8> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(code::GET),
        "POST" => Ok(code::POST),
        "PUT" => Ok(code::PUT),
        "DELETE" | "DEL" => Ok(code::DELETE),
        other => Err(ProtocolError::ConfigError(format!(
            "unknown method {other:?}"
        ))),
    }
}
