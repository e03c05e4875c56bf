//! The ATT opcode: its bit layout, its named PDU table, and the request/response matching rules
//! the bearer uses to validate transaction sequencing.

/// How an opcode behaves in a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PduKind {
    Request,
    Response,
    Command,
    Notification,
    Indication,
    Confirmation,
    Invalid,
}

/// An ATT opcode: bit 7 is the authentication-signature flag, bit 6 is the command flag, and
/// bits 0-5 select the method out of the fixed PDU table below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OpCode(u8);

const SIG_BIT: u8 = 1 << 7;
const COMMAND_BIT: u8 = 1 << 6;
const METHOD_MASK: u8 = 0x3F;

impl OpCode {
    pub const ERROR_RESPONSE: OpCode = OpCode(0x01);
    pub const EXCHANGE_MTU_REQUEST: OpCode = OpCode(0x02);
    pub const EXCHANGE_MTU_RESPONSE: OpCode = OpCode(0x03);
    pub const FIND_INFORMATION_REQUEST: OpCode = OpCode(0x04);
    pub const FIND_INFORMATION_RESPONSE: OpCode = OpCode(0x05);
    pub const FIND_BY_TYPE_VALUE_REQUEST: OpCode = OpCode(0x06);
    pub const FIND_BY_TYPE_VALUE_RESPONSE: OpCode = OpCode(0x07);
    pub const READ_BY_TYPE_REQUEST: OpCode = OpCode(0x08);
    pub const READ_BY_TYPE_RESPONSE: OpCode = OpCode(0x09);
    pub const READ_REQUEST: OpCode = OpCode(0x0A);
    pub const READ_RESPONSE: OpCode = OpCode(0x0B);
    pub const READ_BLOB_REQUEST: OpCode = OpCode(0x0C);
    pub const READ_BLOB_RESPONSE: OpCode = OpCode(0x0D);
    pub const READ_MULTIPLE_REQUEST: OpCode = OpCode(0x0E);
    pub const READ_MULTIPLE_RESPONSE: OpCode = OpCode(0x0F);
    pub const READ_BY_GROUP_TYPE_REQUEST: OpCode = OpCode(0x10);
    pub const READ_BY_GROUP_TYPE_RESPONSE: OpCode = OpCode(0x11);
    pub const WRITE_REQUEST: OpCode = OpCode(0x12);
    pub const WRITE_RESPONSE: OpCode = OpCode(0x13);
    pub const WRITE_COMMAND: OpCode = OpCode(0x52);
    pub const SIGNED_WRITE_COMMAND: OpCode = OpCode(0xD2);
    pub const PREPARE_WRITE_REQUEST: OpCode = OpCode(0x16);
    pub const PREPARE_WRITE_RESPONSE: OpCode = OpCode(0x17);
    pub const EXECUTE_WRITE_REQUEST: OpCode = OpCode(0x18);
    pub const EXECUTE_WRITE_RESPONSE: OpCode = OpCode(0x19);
    pub const HANDLE_VALUE_NOTIFICATION: OpCode = OpCode(0x1B);
    pub const HANDLE_VALUE_INDICATION: OpCode = OpCode(0x1D);
    pub const HANDLE_VALUE_CONFIRMATION: OpCode = OpCode(0x1E);

    pub fn from_raw(raw: u8) -> OpCode {
        OpCode(raw)
    }

    pub fn into_raw(self) -> u8 {
        self.0
    }

    pub fn has_signature(self) -> bool {
        self.0 & SIG_BIT != 0
    }

    pub fn is_command_flagged(self) -> bool {
        self.0 & COMMAND_BIT != 0
    }

    pub fn method(self) -> u8 {
        self.0 & METHOD_MASK
    }

    /// Classify this opcode per §3 of the specification: the command flag wins over the fixed
    /// opcode table, exactly as the teacher's `PduOpCode`/`ServerPduName`/`ClientPduName` split
    /// does it (`command` is checked before the name tables are consulted).
    pub fn kind(self) -> PduKind {
        if self.is_command_flagged() {
            return PduKind::Command;
        }

        match self {
            OpCode::ERROR_RESPONSE
            | OpCode::EXCHANGE_MTU_RESPONSE
            | OpCode::FIND_INFORMATION_RESPONSE
            | OpCode::FIND_BY_TYPE_VALUE_RESPONSE
            | OpCode::READ_BY_TYPE_RESPONSE
            | OpCode::READ_RESPONSE
            | OpCode::READ_BLOB_RESPONSE
            | OpCode::READ_MULTIPLE_RESPONSE
            | OpCode::READ_BY_GROUP_TYPE_RESPONSE
            | OpCode::WRITE_RESPONSE
            | OpCode::PREPARE_WRITE_RESPONSE
            | OpCode::EXECUTE_WRITE_RESPONSE => PduKind::Response,

            OpCode::EXCHANGE_MTU_REQUEST
            | OpCode::FIND_INFORMATION_REQUEST
            | OpCode::FIND_BY_TYPE_VALUE_REQUEST
            | OpCode::READ_BY_TYPE_REQUEST
            | OpCode::READ_REQUEST
            | OpCode::READ_BLOB_REQUEST
            | OpCode::READ_MULTIPLE_REQUEST
            | OpCode::READ_BY_GROUP_TYPE_REQUEST
            | OpCode::WRITE_REQUEST
            | OpCode::PREPARE_WRITE_REQUEST
            | OpCode::EXECUTE_WRITE_REQUEST => PduKind::Request,

            OpCode::HANDLE_VALUE_NOTIFICATION => PduKind::Notification,
            OpCode::HANDLE_VALUE_INDICATION => PduKind::Indication,
            OpCode::HANDLE_VALUE_CONFIRMATION => PduKind::Confirmation,

            _ => PduKind::Invalid,
        }
    }

    /// The request/indication opcode that a response/confirmation opcode completes, or `None` if
    /// `self` does not end a transaction (or is not recognized).
    ///
    /// This is `MatchingTransactionCode` from the specification.
    pub fn matching_transaction_code(self) -> Option<OpCode> {
        Some(match self {
            OpCode::EXCHANGE_MTU_RESPONSE => OpCode::EXCHANGE_MTU_REQUEST,
            OpCode::FIND_INFORMATION_RESPONSE => OpCode::FIND_INFORMATION_REQUEST,
            OpCode::FIND_BY_TYPE_VALUE_RESPONSE => OpCode::FIND_BY_TYPE_VALUE_REQUEST,
            OpCode::READ_BY_TYPE_RESPONSE => OpCode::READ_BY_TYPE_REQUEST,
            OpCode::READ_RESPONSE => OpCode::READ_REQUEST,
            OpCode::READ_BLOB_RESPONSE => OpCode::READ_BLOB_REQUEST,
            OpCode::READ_MULTIPLE_RESPONSE => OpCode::READ_MULTIPLE_REQUEST,
            OpCode::READ_BY_GROUP_TYPE_RESPONSE => OpCode::READ_BY_GROUP_TYPE_REQUEST,
            OpCode::WRITE_RESPONSE => OpCode::WRITE_REQUEST,
            OpCode::PREPARE_WRITE_RESPONSE => OpCode::PREPARE_WRITE_REQUEST,
            OpCode::EXECUTE_WRITE_RESPONSE => OpCode::EXECUTE_WRITE_REQUEST,
            OpCode::HANDLE_VALUE_CONFIRMATION => OpCode::HANDLE_VALUE_INDICATION,
            _ => return None,
        })
    }

    /// A human-readable name for logging, mirroring the teacher's `ServerPduName`/`ClientPduName`
    /// `Display` impls.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::ERROR_RESPONSE => "Error Response",
            OpCode::EXCHANGE_MTU_REQUEST => "Exchange MTU Request",
            OpCode::EXCHANGE_MTU_RESPONSE => "Exchange MTU Response",
            OpCode::FIND_INFORMATION_REQUEST => "Find Information Request",
            OpCode::FIND_INFORMATION_RESPONSE => "Find Information Response",
            OpCode::FIND_BY_TYPE_VALUE_REQUEST => "Find By Type Value Request",
            OpCode::FIND_BY_TYPE_VALUE_RESPONSE => "Find By Type Value Response",
            OpCode::READ_BY_TYPE_REQUEST => "Read By Type Request",
            OpCode::READ_BY_TYPE_RESPONSE => "Read By Type Response",
            OpCode::READ_REQUEST => "Read Request",
            OpCode::READ_RESPONSE => "Read Response",
            OpCode::READ_BLOB_REQUEST => "Read Blob Request",
            OpCode::READ_BLOB_RESPONSE => "Read Blob Response",
            OpCode::READ_MULTIPLE_REQUEST => "Read Multiple Request",
            OpCode::READ_MULTIPLE_RESPONSE => "Read Multiple Response",
            OpCode::READ_BY_GROUP_TYPE_REQUEST => "Read By Group Type Request",
            OpCode::READ_BY_GROUP_TYPE_RESPONSE => "Read By Group Type Response",
            OpCode::WRITE_REQUEST => "Write Request",
            OpCode::WRITE_RESPONSE => "Write Response",
            OpCode::WRITE_COMMAND => "Write Command",
            OpCode::SIGNED_WRITE_COMMAND => "Signed Write Command",
            OpCode::PREPARE_WRITE_REQUEST => "Prepare Write Request",
            OpCode::PREPARE_WRITE_RESPONSE => "Prepare Write Response",
            OpCode::EXECUTE_WRITE_REQUEST => "Execute Write Request",
            OpCode::EXECUTE_WRITE_RESPONSE => "Execute Write Response",
            OpCode::HANDLE_VALUE_NOTIFICATION => "Handle Value Notification",
            OpCode::HANDLE_VALUE_INDICATION => "Handle Value Indication",
            OpCode::HANDLE_VALUE_CONFIRMATION => "Handle Value Confirmation",
            _ => "Unknown",
        }
    }
}

impl core::fmt::Display for OpCode {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{} ({:#04X})", self.name(), self.0)
    }
}
