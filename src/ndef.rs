//! Minimal NDEF reader for the URI record written on a jukebox tag.

/// TLV terminator on NTAG memory.
const TERMINATOR: u8 = 0xFE;
/// Record type of a well-known URI record.
const URI_RECORD_TYPE: u8 = b'U';

/// NFC Forum URI identifier codes, indexed by code.
const URI_PREFIXES: [&str; 0x24] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// Extracts the first URI record from raw tag memory.
///
/// The byte before the `U` type marker is the payload length; the payload is
/// one identifier code followed by the rest of the URI.
pub fn parse_ndef_uri(data: &[u8]) -> Option<String> {
    let data = match data.iter().position(|&b| b == TERMINATOR) {
        Some(end) => &data[..end],
        None => data,
    };

    let marker = data.iter().position(|&b| b == URI_RECORD_TYPE)?;
    let payload_length = *data.get(marker.checked_sub(1)?)? as usize;
    let prefix_code = *data.get(marker + 1)? as usize;

    let body_start = marker + 2;
    let body_end = (marker + 1 + payload_length).min(data.len());
    let body = data.get(body_start..body_end.max(body_start))?;

    let prefix = URI_PREFIXES.get(prefix_code).copied().unwrap_or("");
    let body = std::str::from_utf8(body).ok()?;

    Some(format!("{}{}", prefix, body))
}

/// Strips the padding some writers leave in the record.
pub fn clean_uri(uri: &str) -> String {
    uri.trim().replace('\0', "")
}
