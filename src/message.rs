use crate::error::{DenonError, Result};
use crate::grammar::Grammar;
use serde::Serialize;
use std::sync::Arc;

/// Suffix marking a line that expects a reply
pub const QUERY_MARKER: char = '?';

/// Character decoding applied to received bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Ascii,
    /// Used for NET/USB onscreen information requested with `NSE`
    Utf8,
}

/// A received line broken down into its components
///
/// When the command is not recognized every field is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    command_code: Option<String>,
    command_label: Option<String>,
    subcommand_code: Option<String>,
    subcommand_label: Option<String>,
    parameter_code: Option<String>,
    parameter_label: Option<String>,
    unparsed: Option<String>,
    response: Option<String>,
}

impl ParsedMessage {
    pub fn command_code(&self) -> Option<&str> {
        self.command_code.as_deref()
    }

    pub fn command_label(&self) -> Option<&str> {
        self.command_label.as_deref()
    }

    pub fn subcommand_code(&self) -> Option<&str> {
        self.subcommand_code.as_deref()
    }

    pub fn subcommand_label(&self) -> Option<&str> {
        self.subcommand_label.as_deref()
    }

    pub fn parameter_code(&self) -> Option<&str> {
        self.parameter_code.as_deref()
    }

    pub fn parameter_label(&self) -> Option<&str> {
        self.parameter_label.as_deref()
    }

    /// Text left over after parameter matching, if any
    pub fn unparsed(&self) -> Option<&str> {
        self.unparsed.as_deref()
    }

    /// Human readable summary, e.g. `"Master Volume, Maximum:  18.0dB"`
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn is_recognized(&self) -> bool {
        self.command_label.is_some()
    }
}

/// Collects the fields during a single parse
#[derive(Default)]
struct MessageBuilder<'a> {
    command: Option<(&'a str, &'a str)>,
    subcommand: Option<(&'a str, &'a str)>,
    parameter: Option<(&'a str, &'a str)>,
    unparsed: Option<&'a str>,
}

impl MessageBuilder<'_> {
    fn build(self) -> ParsedMessage {
        let Some((command_code, command_label)) = self.command else {
            return ParsedMessage::default();
        };

        let parameter_label = self.parameter.map(|(_, label)| label).unwrap_or("unknown");
        let response = match self.subcommand {
            Some((_, subcommand_label)) => {
                format!("{command_label}, {subcommand_label}: {parameter_label}")
            }
            None => format!("{command_label}: {parameter_label}"),
        };

        ParsedMessage {
            command_code: Some(command_code.to_string()),
            command_label: Some(command_label.to_string()),
            subcommand_code: self.subcommand.map(|(code, _)| code.to_string()),
            subcommand_label: self.subcommand.map(|(_, label)| label.to_string()),
            parameter_code: self.parameter.map(|(code, _)| code.to_string()),
            parameter_label: self.parameter.map(|(_, label)| label.to_string()),
            unparsed: self.unparsed.map(str::to_string),
            response: Some(response),
        }
    }
}

/// Translates between wire text and [`ParsedMessage`]s using a [`Grammar`]
#[derive(Debug, Clone)]
pub struct Codec {
    grammar: Arc<Grammar>,
}

impl Codec {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self { grammar }
    }

    /// Codec over the DN-500AV grammar
    pub fn dn500av() -> Self {
        Self::new(Arc::new(Grammar::dn500av()))
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Decode raw bytes, then parse them
    ///
    /// Bytes that are not valid in the requested encoding are logged and
    /// produce an unrecognized message.
    pub fn parse_bytes(&self, line: &[u8], encoding: TextEncoding) -> ParsedMessage {
        let text = match encoding {
            TextEncoding::Ascii if !line.is_ascii() => None,
            TextEncoding::Ascii | TextEncoding::Utf8 => std::str::from_utf8(line).ok(),
        };

        match text {
            Some(text) => self.parse_response(text),
            None => {
                tracing::error!("Undecodable {:?} line: {:02X?}", encoding, line);
                ParsedMessage::default()
            }
        }
    }

    /// Parse a status line received from the receiver
    pub fn parse_response(&self, line: &str) -> ParsedMessage {
        tracing::debug!("Received status command: {}", line);
        let mut builder = MessageBuilder::default();

        // Codes have known lengths; the longest candidate is tried first
        let grammar = &*self.grammar;
        let found = (grammar.min_command_len()..=grammar.max_command_len())
            .rev()
            .filter_map(|len| line.get(..len))
            .find_map(|code| grammar.command(code));
        let Some(descriptor) = found else {
            tracing::error!("Command unknown: {}", line);
            return builder.build();
        };

        tracing::debug!("Parsed command {}: {}", descriptor.code, descriptor.label);
        builder.command = Some((descriptor.code.as_str(), descriptor.label.as_str()));
        let mut rest = &line[descriptor.code.len()..];

        if let Some(subcommands) = &descriptor.subcommands {
            let found = (subcommands.min_len()..=subcommands.max_len())
                .rev()
                .filter_map(|len| rest.get(..len))
                .find_map(|code| subcommands.label(code).map(|label| (code, label)));

            match found {
                Some((code, label)) => {
                    tracing::debug!("Parsed subcommand {}: {}", code, label);
                    builder.subcommand = Some((code, label));
                    rest = &rest[code.len()..];
                    // A single space separates the subcommand from its parameter
                    rest = rest.strip_prefix(' ').unwrap_or(rest);
                }
                None => {
                    tracing::debug!("Subcommand unknown. Probably a parameter: {}", rest);
                }
            }
        }

        let subcommand = builder.subcommand.map(|(code, _)| code);
        match descriptor.parameters.label(subcommand, rest) {
            Some(label) => {
                builder.parameter = Some((rest, label));
                rest = "";
            }
            None => tracing::error!("Parameter unknown: {}", rest),
        }

        if !rest.is_empty() {
            tracing::error!("Unexpected unparsed data found: {}", rest);
            builder.unparsed = Some(rest);
        }

        builder.build()
    }

    /// Format an outbound line; a missing parameter makes it a query
    ///
    /// Command, subcommand and parameter must all be known to the grammar.
    pub fn format_request(
        &self,
        command: &str,
        subcommand: Option<&str>,
        parameter: Option<&str>,
    ) -> Result<String> {
        let descriptor = self
            .grammar
            .command(command)
            .ok_or_else(|| DenonError::UnknownCommand(command.to_string()))?;

        let mut line = String::from(command);
        if let Some(sub) = subcommand {
            let known = descriptor
                .subcommands
                .as_ref()
                .and_then(|subs| subs.label(sub))
                .is_some();
            if !known {
                return Err(DenonError::UnknownSubcommand {
                    command: command.to_string(),
                    subcommand: sub.to_string(),
                });
            }
            line.push_str(sub);
            line.push(' ');
        }

        match parameter {
            None => line.push(QUERY_MARKER),
            Some(param) => {
                if descriptor.parameters.label(subcommand, param).is_none() {
                    return Err(DenonError::UnknownParameter {
                        command: command.to_string(),
                        parameter: param.to_string(),
                    });
                }
                line.push_str(param);
            }
        }

        Ok(line)
    }

    /// Master volume line for a display label, `"Up"` or `"Down"`
    pub fn volume_request(&self, label: &str) -> Result<String> {
        let raw = self.grammar.master_volume_code(label)?;
        self.format_request("MV", None, Some(raw))
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::dn500av()
    }
}
