//! STOMP 1.2 frame codec.
//!
//! Frames travel as WebSocket text messages.  A message may carry several
//! frames and bare EOLs (heart-beats), so decoding goes through
//! [`Frame::parse_all`].

use crate::error::{ChatLinkError, Result};
use std::fmt;
use std::str::FromStr;

const NUL: char = '\0';

/// Frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    /// CONNECT and CONNECTED headers are sent verbatim (STOMP 1.2 §Value Encoding).
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ChatLinkError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => {
                return Err(ChatLinkError::ProtocolError(format!(
                    "Unknown STOMP command '{}'",
                    other
                )))
            },
        })
    }
}

/// Heart-beat intervals in milliseconds, as carried by the `heart-beat` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which the sender will emit heart-beats (0 = never).
    pub outgoing_ms: u64,
    /// Desired interval at which the sender wants to receive heart-beats (0 = never).
    pub incoming_ms: u64,
}

impl HeartBeat {
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing_ms,
            incoming_ms,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let (out, inc) = value.split_once(',').ok_or_else(|| {
            ChatLinkError::ProtocolError(format!("Malformed heart-beat header '{}'", value))
        })?;
        let parse = |v: &str| {
            v.trim().parse::<u64>().map_err(|_| {
                ChatLinkError::ProtocolError(format!("Malformed heart-beat header '{}'", value))
            })
        };
        Ok(Self::new(parse(out)?, parse(inc)?))
    }

    pub fn header_value(&self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Negotiated `(send_every_ms, expect_every_ms)` for the client, given
    /// what the client offered and what the server answered.  Zero disables.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> (u64, u64) {
        let send = if client.outgoing_ms == 0 || server.incoming_ms == 0 {
            0
        } else {
            client.outgoing_ms.max(server.incoming_ms)
        };
        let expect = if client.incoming_ms == 0 || server.outgoing_ms == 0 {
            0
        } else {
            client.incoming_ms.max(server.outgoing_ms)
        };
        (send, expect)
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order.  Repeated names keep the first occurrence's value.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(
        host: &str,
        heart_beat: HeartBeat,
        extra_headers: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut frame = Frame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header("heart-beat", heart_beat.header_value());
        frame.headers.extend(extra_headers);
        frame
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).with_header("id", id)
    }

    /// `SEND` with a JSON body.
    pub fn send_json(destination: &str, body: impl Into<String>) -> Self {
        Frame::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).with_header("receipt", receipt)
    }

    /// Copy with credential headers masked, for logs and debug hooks.
    pub fn redacted(&self) -> Frame {
        let mut copy = self.clone();
        for (name, value) in copy.headers.iter_mut() {
            if name.eq_ignore_ascii_case("authorization") || name == "passcode" {
                *value = "***".to_string();
            }
        }
        copy
    }

    /// Encode to wire text, NUL terminator included.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.header("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push(NUL);
        out
    }

    /// Decode the first frame in `text`.  `Ok(None)` when `text` is only heart-beats.
    pub fn parse(text: &str) -> Result<Option<Frame>> {
        let mut rest = skip_eols(text);
        if rest.is_empty() {
            return Ok(None);
        }
        let frame = parse_one(&mut rest)?;
        Ok(Some(frame))
    }

    /// Decode every frame in `text`, skipping heart-beats.
    pub fn parse_all(text: &str) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        let mut rest = skip_eols(text);
        while !rest.is_empty() {
            frames.push(parse_one(&mut rest)?);
            rest = skip_eols(rest);
        }
        Ok(frames)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(dest) = self.header("destination") {
            write!(f, " {}", dest)?;
        }
        Ok(())
    }
}

fn skip_eols(text: &str) -> &str {
    text.trim_start_matches(['\n', '\r'])
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn parse_one(rest: &mut &str) -> Result<Frame> {
    let (command_line, after) = rest
        .split_once('\n')
        .ok_or_else(|| ChatLinkError::ProtocolError("Frame has no command line".to_string()))?;
    let command: Command = strip_cr(command_line).parse()?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    let mut cursor = after;
    loop {
        let (line, next) = cursor.split_once('\n').ok_or_else(|| {
            ChatLinkError::ProtocolError(format!("{} frame headers not terminated", command))
        })?;
        cursor = next;
        let line = strip_cr(line);
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            ChatLinkError::ProtocolError(format!("Malformed header line '{}'", line))
        })?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim().parse::<usize>().map_err(|_| {
                ChatLinkError::ProtocolError(format!("Invalid content-length '{}'", v))
            })
        })
        .transpose()?;

    let (body, remainder) = match content_length {
        Some(len) => {
            let body = cursor.get(..len).ok_or_else(|| {
                ChatLinkError::ProtocolError(format!(
                    "{} body shorter than content-length {}",
                    command, len
                ))
            })?;
            let remainder = cursor[len..].strip_prefix(NUL).ok_or_else(|| {
                ChatLinkError::ProtocolError(format!("{} frame missing NUL terminator", command))
            })?;
            (body, remainder)
        },
        None => cursor.split_once(NUL).ok_or_else(|| {
            ChatLinkError::ProtocolError(format!("{} frame missing NUL terminator", command))
        })?,
    };

    *rest = remainder;
    Ok(Frame {
        command,
        headers,
        body: body.to_string(),
    })
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ChatLinkError::ProtocolError(format!(
                    "Undefined escape sequence '\\{}' in header",
                    other.map(String::from).unwrap_or_default()
                )))
            },
        }
    }
    Ok(out)
}
