use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid bearing spec `{0}`; expected JOIN_INDEX=DEGREES")]
    InvalidBearing(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    Ws(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for CliError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Ws(Box::new(error))
    }
}

#[derive(Parser, Debug)]
#[command(name = "position-cli", about = "Device simulator and admin client for the position server")]
struct Cli {
    #[arg(long, env = "POSITION_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check `/healthz`.
    Ping,
    /// Print the roster snapshot.
    Users,
    /// Clear every participant.
    Reset,
    /// Join as a device and answer calibration turns with fixed bearings.
    Device(DeviceArgs),
}

#[derive(Args, Debug)]
struct DeviceArgs {
    #[arg(long, default_value = "cli-device")]
    name: String,

    #[arg(long, default_value = "Gray")]
    color: String,

    /// Bearing to report toward each partner, keyed by the partner's join
    /// index, e.g. `--bearings 0=250,2=310`.
    #[arg(long, value_delimiter = ',')]
    bearings: Vec<String>,

    /// Exit once this device has been placed on the grid.
    #[arg(long, default_value_t = false)]
    until_positioned: bool,
}

// =============================================================================
// WIRE FRAME
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Request,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Frame {
    id: Uuid,
    parent_id: Option<Uuid>,
    ts: i64,
    from: Option<String>,
    syscall: String,
    status: Status,
    #[serde(default)]
    data: Map<String, Value>,
}

impl Frame {
    fn request(syscall: &str, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            from: None,
            syscall: syscall.to_owned(),
            status: Status::Request,
            data,
        }
    }

    fn message(&self) -> String {
        self.data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown websocket error")
            .to_owned()
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Users => run_users(&cli.base_url).await,
        Command::Reset => run_reset(&cli.base_url).await,
        Command::Device(args) => run_device(&cli.base_url, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            syscall: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_users(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/api/users", base_url.trim_end_matches('/'));
    let response = reqwest::get(url).await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(CliError::ServerError { syscall: format!("HTTP {}", status.as_u16()), message: value.to_string() });
    }
    print_json(&value)
}

async fn run_reset(base_url: &str) -> Result<(), CliError> {
    let mut stream = connect(base_url).await?;
    request(&mut stream, "room:reset", Value::Object(Map::new())).await?;
    println!("room reset");
    Ok(())
}

async fn run_device(base_url: &str, args: DeviceArgs) -> Result<(), CliError> {
    let bearings = parse_bearings(&args.bearings)?;
    let mut stream = connect(base_url).await?;

    let joined =
        request(&mut stream, "room:join", serde_json::json!({ "name": args.name, "color": args.color })).await?;
    let me = joined
        .data
        .get("participant")
        .and_then(|p| p.get("id"))
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(CliError::MissingField("participant.id"))?;
    let join_index = joined.data.get("participant").and_then(|p| p.get("join_index")).cloned().unwrap_or_default();
    eprintln!("joined as {me} (join index {join_index})");

    loop {
        let frame = recv_next(&mut stream, None).await?;
        match frame.syscall.as_str() {
            "calibration:next" => {
                let partner = frame.data.get("partner").cloned().unwrap_or_default();
                let partner_index = partner.get("join_index").and_then(Value::as_u64).ok_or(CliError::MissingField("partner.join_index"))?;
                let partner_id = partner.get("id").cloned().ok_or(CliError::MissingField("partner.id"))?;
                let Some(bearing) = bearings.get(&partner_index) else {
                    eprintln!("no bearing configured toward join index {partner_index}; waiting");
                    continue;
                };
                eprintln!("calibrating toward join index {partner_index} at {bearing}°");
                let reply = request(
                    &mut stream,
                    "calibration:submit",
                    serde_json::json!({ "target_id": partner_id, "bearing": bearing }),
                )
                .await?;
                if let Some(error) = reply.data.get("position_error") {
                    eprintln!("position not computed: {error}");
                }
            }
            "room:updateposition" => {
                let changed = frame.data.get("changed").cloned().unwrap_or_default();
                print_json(&changed)?;
                let is_me = changed.get("id").and_then(Value::as_str) == Some(me.to_string().as_str());
                if args.until_positioned && is_me {
                    return Ok(());
                }
            }
            "room:reset" => {
                eprintln!("room was reset");
                return Ok(());
            }
            other => eprintln!("{other}"),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_bearings(specs: &[String]) -> Result<HashMap<u64, f64>, CliError> {
    specs
        .iter()
        .map(|spec| {
            let (index, degrees) = spec.split_once('=').ok_or_else(|| CliError::InvalidBearing(spec.clone()))?;
            let index = index.trim().parse::<u64>().map_err(|_| CliError::InvalidBearing(spec.clone()))?;
            let degrees = degrees
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .ok_or_else(|| CliError::InvalidBearing(spec.clone()))?;
            Ok((index, degrees))
        })
        .collect()
}

fn ws_url(base_url: &str) -> Result<String, CliError> {
    let base_url = base_url.trim_end_matches('/');
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws"));
    }
    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

async fn connect(base_url: &str) -> Result<WsStream, CliError> {
    let (mut stream, _) = connect_async(ws_url(base_url)?).await?;
    loop {
        let frame = recv_next(&mut stream, Some(Duration::from_secs(5))).await?;
        if frame.syscall == "session:connected" {
            return Ok(stream);
        }
    }
}

/// Send a request and wait for its terminal reply. Unrelated frames that
/// arrive meanwhile are dropped.
async fn request(stream: &mut WsStream, syscall: &str, data: Value) -> Result<Frame, CliError> {
    let req = Frame::request(syscall, data);
    stream.send(Message::text(serde_json::to_string(&req)?)).await?;
    loop {
        let frame = recv_next(stream, Some(Duration::from_secs(15))).await?;
        if frame.parent_id != Some(req.id) {
            continue;
        }
        if frame.status == Status::Error {
            return Err(CliError::ServerError { message: frame.message(), syscall: frame.syscall });
        }
        return Ok(frame);
    }
}

async fn recv_next(stream: &mut WsStream, timeout: Option<Duration>) -> Result<Frame, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match message? {
                Message::Text(text) => return serde_json::from_str::<Frame>(&text).map_err(CliError::from),
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| CliError::Timeout)?,
        None => fut.await,
    }
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
