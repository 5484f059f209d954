//! Command tags and outbound framing.
//!
//! Every command the controller understands is a variant of [`Tag`]. The tag decides the
//! wire spelling, whether an argument follows, how the reply payload is decoded and which
//! wait budget applies, so adding a tag forces every one of those decisions at compile
//! time.

use super::{normalize_azimuth, COMMAND_ENVELOPE, FIELD_SEPARATOR};
use crate::error::{DomeError, DomeResult};
use std::fmt;

/// Wire tags, named after their exact spelling on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `OS` open shutter
    Os,
    /// `CS` close shutter
    Cs,
    /// `SS` shutter status (action form)
    Ss,
    /// `S` shutter status
    S,
    /// `VS` firmware version / status
    Vs,
    /// `AZ` current azimuth
    Az,
    /// `SLEWAZ:<deg>` slew to azimuth
    SlewAz,
    /// `SYNCAZ:<deg>` sync azimuth (action form)
    SyncAz,
    /// `SAZ:<deg>` sync azimuth
    Saz,
    /// `STOPSLEW` abort slew
    StopSlew,
    /// `STOPAZ` abort slew (action form)
    StopAz,
    /// `SETP:<deg>` set park azimuth
    SetP,
    /// `P` park
    P,
    /// `GETP` at-park query
    GetP,
    /// `GETSLEW` slewing query
    GetSlew,
    /// `LS` lower shutter
    Ls,
    /// `US` upper shutter
    Us,
    /// `T` temperature
    T,
}

/// How the payload of a reply to a given tag is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Acknowledgement only; the payload is not inspected.
    Ack,
    /// Decimal degrees.
    Azimuth,
    /// Integer shutter code.
    Shutter,
    /// Literal `true` / `false`.
    Flag,
    /// Free text, returned as-is.
    Text,
}

impl Tag {
    /// Every tag, in catalog order.
    pub const ALL: [Tag; 18] = [
        Tag::Os,
        Tag::Cs,
        Tag::Ss,
        Tag::S,
        Tag::Vs,
        Tag::Az,
        Tag::SlewAz,
        Tag::SyncAz,
        Tag::Saz,
        Tag::StopSlew,
        Tag::StopAz,
        Tag::SetP,
        Tag::P,
        Tag::GetP,
        Tag::GetSlew,
        Tag::Ls,
        Tag::Us,
        Tag::T,
    ];

    /// Exact wire spelling.
    pub fn wire(self) -> &'static str {
        match self {
            Tag::Os => "OS",
            Tag::Cs => "CS",
            Tag::Ss => "SS",
            Tag::S => "S",
            Tag::Vs => "VS",
            Tag::Az => "AZ",
            Tag::SlewAz => "SLEWAZ",
            Tag::SyncAz => "SYNCAZ",
            Tag::Saz => "SAZ",
            Tag::StopSlew => "STOPSLEW",
            Tag::StopAz => "STOPAZ",
            Tag::SetP => "SETP",
            Tag::P => "P",
            Tag::GetP => "GETP",
            Tag::GetSlew => "GETSLEW",
            Tag::Ls => "LS",
            Tag::Us => "US",
            Tag::T => "T",
        }
    }

    /// Whether the tag carries an argument field.
    pub fn takes_argument(self) -> bool {
        matches!(self, Tag::SlewAz | Tag::SyncAz | Tag::Saz | Tag::SetP)
    }

    /// Payload decoding for replies to this tag.
    pub fn reply(self) -> ReplyKind {
        match self {
            Tag::Os
            | Tag::Cs
            | Tag::SlewAz
            | Tag::SyncAz
            | Tag::Saz
            | Tag::StopSlew
            | Tag::StopAz
            | Tag::SetP
            | Tag::P => ReplyKind::Ack,
            Tag::Ss | Tag::S => ReplyKind::Shutter,
            Tag::Az => ReplyKind::Azimuth,
            Tag::GetP | Tag::GetSlew => ReplyKind::Flag,
            Tag::Vs | Tag::Ls | Tag::Us | Tag::T => ReplyKind::Text,
        }
    }

    /// Commands that start mechanical motion and get the motion budget.
    pub fn is_motion(self) -> bool {
        matches!(self, Tag::Os | Tag::Cs | Tag::SlewAz | Tag::P)
    }

    /// Case-insensitive lookup by wire spelling.
    pub fn from_wire(text: &str) -> Option<Tag> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.wire().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire())
    }
}

/// A request to the controller: a tag plus zero or more argument fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    tag: Tag,
    args: Vec<String>,
}

impl Command {
    /// Command with no arguments.
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            args: Vec::new(),
        }
    }

    /// Command with verbatim argument fields.
    ///
    /// A field containing a line terminator would put a second line on the wire, so it is
    /// rejected with [`DomeError::InvalidArgument`].
    pub fn with_args<I, S>(tag: Tag, args: I) -> DomeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        if let Some(arg) = args.iter().find(|arg| arg.contains(['\n', '\r'])) {
            return Err(DomeError::InvalidArgument(format!(
                "{tag} argument contains a line terminator: {arg:?}"
            )));
        }
        Ok(Self { tag, args })
    }

    /// Command with a single angle argument, normalized and formatted to two decimals.
    pub fn with_angle(tag: Tag, degrees: f64) -> Self {
        Self {
            tag,
            args: vec![format_angle(degrees)],
        }
    }

    /// Parse `TAG[:arg...]` (no envelope).
    ///
    /// An unknown tag is [`DomeError::UnsupportedAction`]; embedded line terminators are
    /// [`DomeError::InvalidArgument`].
    pub fn parse(text: &str) -> DomeResult<Self> {
        let mut fields = text.trim().split(FIELD_SEPARATOR);
        let tag = fields
            .next()
            .and_then(Tag::from_wire)
            .ok_or_else(|| DomeError::UnsupportedAction(text.to_string()))?;
        Self::with_args(tag, fields)
    }

    /// The command tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The argument fields.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// `TAG[:arg...]` without the envelope.
    pub fn body(&self) -> String {
        let mut body = self.tag.wire().to_string();
        for arg in &self.args {
            body.push(FIELD_SEPARATOR);
            body.push_str(arg);
        }
        body
    }

    /// Full outbound line (without terminator).
    pub fn frame(&self) -> String {
        format!("{}{}{}", COMMAND_ENVELOPE, FIELD_SEPARATOR, self.body())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.frame())
    }
}

/// Two-decimal angle formatting used for every angle on the wire.
///
/// The value is normalized first and a result that rounds up to 360.00 wraps to 0.00.
pub fn format_angle(degrees: f64) -> String {
    let rounded = (normalize_azimuth(degrees) * 100.0).round() / 100.0;
    let rounded = if rounded >= 360.0 { 0.0 } else { rounded };
    format!("{rounded:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_without_arguments() {
        assert_eq!(Command::new(Tag::Az).frame(), "DC:AZ");
        assert_eq!(Command::new(Tag::StopSlew).to_string(), "DC:STOPSLEW");
    }

    #[test]
    fn test_frame_with_angle() {
        assert_eq!(
            Command::with_angle(Tag::SlewAz, 183.5).frame(),
            "DC:SLEWAZ:183.50"
        );
        assert_eq!(Command::with_angle(Tag::Saz, 7.0).frame(), "DC:SAZ:7.00");
        assert_eq!(Command::with_angle(Tag::SetP, -90.0).frame(), "DC:SETP:270.00");
    }

    #[test]
    fn test_format_angle_wraps_at_full_turn() {
        assert_eq!(format_angle(359.994), "359.99");
        assert_eq!(format_angle(359.999), "0.00");
        assert_eq!(format_angle(720.0), "0.00");
    }

    #[test]
    fn test_tag_lookup_is_case_insensitive() {
        assert_eq!(Tag::from_wire("slewaz"), Some(Tag::SlewAz));
        assert_eq!(Tag::from_wire("GetSlew"), Some(Tag::GetSlew));
        assert_eq!(Tag::from_wire("HOME"), None);
    }

    #[test]
    fn test_wire_spellings_are_unique() {
        for (i, a) in Tag::ALL.iter().enumerate() {
            for b in &Tag::ALL[i + 1..] {
                assert_ne!(a.wire(), b.wire());
            }
        }
    }

    #[test]
    fn test_parse_keeps_arguments_verbatim() {
        let cmd = Command::parse("SETP:12.345").unwrap();
        assert_eq!(cmd.tag(), Tag::SetP);
        assert_eq!(cmd.args(), ["12.345"]);
        assert_eq!(cmd.frame(), "DC:SETP:12.345");

        assert!(matches!(
            Command::parse("FINDHOME"),
            Err(DomeError::UnsupportedAction(_))
        ));
    }

    #[test]
    fn test_line_terminators_in_arguments_are_rejected() {
        assert!(matches!(
            Command::with_args(Tag::SlewAz, ["90\nDC:OS"]),
            Err(DomeError::InvalidArgument(_))
        ));
        assert!(matches!(
            Command::with_args(Tag::SetP, ["10\r"]),
            Err(DomeError::InvalidArgument(_))
        ));
        assert!(matches!(
            Command::parse("SLEWAZ:90\nDC:CS"),
            Err(DomeError::InvalidArgument(_))
        ));
        // trailing terminator is trimmed before splitting
        assert_eq!(Command::parse("SETP:5\r\n").unwrap().frame(), "DC:SETP:5");
    }

    #[test]
    fn test_reply_kinds() {
        assert_eq!(Tag::Az.reply(), ReplyKind::Azimuth);
        assert_eq!(Tag::S.reply(), ReplyKind::Shutter);
        assert_eq!(Tag::GetP.reply(), ReplyKind::Flag);
        assert_eq!(Tag::SlewAz.reply(), ReplyKind::Ack);
        assert!(Tag::SlewAz.is_motion());
        assert!(!Tag::Az.is_motion());
    }
}
