#[macro_use]
extern crate log;

use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::LevelFilter;

use xmlrpc_stream::xmlrpc::scalar::{format_scalar, parse_scalar};
use xmlrpc_stream::xmlrpc::{Client, TypeKind, Value};
use xmlrpc_stream::{BasicEncoding, ClientConfig, Error};

/// Streaming XML-RPC client: calls METHOD on the server at URL and prints the result
#[derive(Parser, Debug)]
#[command(name = "xrc", version, author = "Damien Lecan <dev@dlecan.com>")]
struct Cli {
    /// Allow the Apache extension types (nil, i1, i2, i8, float, biginteger, dom)
    #[arg(long)]
    extensions: bool,

    /// The server accepts requests without Content-Length; with --extensions the body is streamed
    #[arg(long)]
    content_length_optional: bool,

    /// Compress the request body
    #[arg(long)]
    gzip: bool,

    /// Ask for a compressed response
    #[arg(long)]
    accept_gzip: bool,

    /// User name for Basic authentication
    #[arg(long)]
    user: Option<String>,

    /// Password for Basic authentication
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// Encode the credentials as ISO-8859-1 instead of UTF-8
    #[arg(long)]
    latin1: bool,

    /// Connection and reply timeout
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Verbose mode, repeat for tracing
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Server endpoint, e.g. "http://localhost:8080/RPC2"
    url: String,

    method: String,

    /// Parameters as type:text (i4, int, i8, double, bool, string, base64, datetime, bigint, nil);
    /// anything else is sent as a string
    params: Vec<String>,
}

fn parse_param(arg: &str) -> Result<Value, String> {
    let (prefix, text) = match arg.split_once(':') {
        Some(split) => split,
        None => return Ok(Value::from(arg)),
    };
    let kind = match prefix {
        "i4" | "int" => TypeKind::Int,
        "i8" => TypeKind::Long,
        "double" => TypeKind::Double,
        "bool" => TypeKind::Boolean,
        "string" => TypeKind::String,
        "base64" => TypeKind::Base64,
        "datetime" => TypeKind::DateTime,
        "bigint" => TypeKind::BigInteger,
        "nil" => return Ok(Value::Nil),
        _ => return Ok(Value::from(arg)),
    };
    parse_scalar(kind, text).map_err(|reason| format!("invalid {} parameter {:?}: {}", prefix, text, reason))
}

fn render(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match *value {
        Value::Nil => out.push_str("nil"),
        Value::String(ref s) => out.push_str(&format!("{:?}", s)),
        Value::Array(ref items) if items.is_empty() => out.push_str("[]"),
        Value::Array(ref items) => {
            out.push_str("[\n");
            for item in items {
                out.push_str(&pad);
                out.push_str("  ");
                render(item, indent + 1, out);
                out.push('\n');
            }
            out.push_str(&pad);
            out.push(']');
        }
        Value::Struct(ref members) if members.is_empty() => out.push_str("{}"),
        Value::Struct(ref members) => {
            out.push_str("{\n");
            for (name, member) in members {
                out.push_str(&format!("{}  {}: ", pad, name));
                render(member, indent + 1, out);
                out.push('\n');
            }
            out.push_str(&pad);
            out.push('}');
        }
        Value::Dom(ref node) => {
            let name = node.name().map(|n| n.to_string()).unwrap_or_default();
            out.push_str(&format!("<{}> {:?}", name, node.text()));
        }
        ref scalar => {
            out.push_str(&format!("{} {}", scalar.kind(), format_scalar(scalar).unwrap_or_default()));
        }
    }
}

fn run(cli: &Cli) -> Result<Value, Error> {
    let mut config = ClientConfig::parse(&cli.url)?
        .with_extensions(cli.extensions)
        .with_content_length_optional(cli.content_length_optional)
        .with_gzip_compressing(cli.gzip)
        .with_gzip_requesting(cli.accept_gzip);
    if let Some(ref user) = cli.user {
        config = config.with_basic_auth(user, cli.password.as_deref());
    }
    if cli.latin1 {
        config = config.with_basic_encoding(BasicEncoding::Latin1);
    }
    if let Some(secs) = cli.timeout {
        let timeout = Duration::from_secs(secs);
        config = config.with_connection_timeout(timeout).with_reply_timeout(timeout);
    }
    debug!("Using server: {}", config.server_url);
    debug!("Extensions: {}", config.stream.enabled_for_extensions);

    let params = cli.params
        .iter()
        .map(|p| parse_param(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::Config)?;

    let mut client = Client::new(config)?;
    client.execute(&cli.method, params)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Raise the level only if user required it, RUST_LOG applies otherwise
    let mut logger = env_logger::Builder::from_default_env();
    match cli.verbose {
        0 => {}
        1 => {
            logger.filter_level(LevelFilter::Debug);
        }
        _ => {
            logger.filter_level(LevelFilter::Trace);
        }
    }
    logger.init();

    match run(&cli) {
        Ok(value) => {
            let mut out = String::new();
            render(&value, 0, &mut out);
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(Error::Fault(fault)) => {
            println!("{}", fault);
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("xrc: {}", e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use clap::Parser;

    use super::{parse_param, render, Cli};
    use xmlrpc_stream::xmlrpc::Value;

    #[test]
    fn test_params() {
        assert_eq!(Ok(Value::Int(3)), parse_param("i4:3"));
        assert_eq!(Ok(Value::Long(1 << 40)), parse_param("i8:1099511627776"));
        assert_eq!(Ok(Value::Boolean(true)), parse_param("bool:1"));
        assert_eq!(Ok(Value::Nil), parse_param("nil:"));
        assert_eq!(Ok(Value::from("plain")), parse_param("plain"));
        assert_eq!(Ok(Value::from("http://x")), parse_param("http://x"));
        assert_eq!(Ok(Value::from("a:b")), parse_param("string:a:b"));
        assert!(parse_param("int:x").is_err());
    }

    #[test]
    fn test_render() {
        let mut members = BTreeMap::new();
        members.insert("n".to_string(), Value::Int(1));
        members.insert("list".to_string(), Value::Array(vec![Value::from("a"), Value::Nil]));
        let mut out = String::new();
        render(&Value::Struct(members), 0, &mut out);
        assert_eq!("{\n  list: [\n    \"a\"\n    nil\n  ]\n  n: i4 1\n}", out);
    }

    #[test]
    fn test_arguments() {
        let cli = Cli::try_parse_from(["xrc", "-vv", "--extensions", "http://h/RPC2", "m", "i4:1", "x"]).unwrap();
        assert_eq!(2, cli.verbose);
        assert!(cli.extensions);
        assert_eq!(vec!["i4:1".to_string(), "x".to_string()], cli.params);
        assert!(Cli::try_parse_from(["xrc", "--password", "p", "http://h", "m"]).is_err());
    }
}
