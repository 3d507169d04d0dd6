use super::address::StacksAddress;

const TYPE_PRINCIPAL_STANDARD: u8 = 0x05;
const TYPE_STRING_UTF8: u8 = 0x0e;

/// The subset of Clarity values the receipt contract takes as arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    StringUtf8(String),
    StandardPrincipal(StacksAddress),
}

impl ClarityValue {
    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        match self {
            ClarityValue::StringUtf8(value) => {
                out.push(TYPE_STRING_UTF8);
                out.extend_from_slice(&(value.len() as u32).to_be_bytes());
                out.extend_from_slice(value.as_bytes());
            }
            ClarityValue::StandardPrincipal(address) => {
                out.push(TYPE_PRINCIPAL_STANDARD);
                out.push(address.version());
                out.extend_from_slice(address.hash160());
            }
        }
    }
}
