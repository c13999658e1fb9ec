/// Format bytes as a hex string
pub fn format_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Format bytes as a hex string with spaces
pub fn format_hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a command line into the command name and its arguments
pub fn split_command_line(line: &str) -> Option<(&str, Vec<&str>)> {
    let mut tokens = line.split_whitespace();
    let name = tokens.next()?;
    Some((name, tokens.collect()))
}

/// Whether a script line carries no command
pub fn is_blank_or_comment(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#') || line.starts_with("//")
}

/// Get a human-readable description of SW1/SW2 status words
pub fn describe_status_word(sw1: u8, sw2: u8) -> String {
    match (sw1, sw2) {
        (0x90, 0x00) => "Success".to_string(),
        (0x61, n) => format!("Success, {n} bytes available"),
        (0x62, 0x00) => "Warning: No information given".to_string(),
        (0x63, 0x00) => "Warning: Verification failed".to_string(),
        (0x63, n) if n & 0xF0 == 0xC0 => format!("Warning: {} tries remaining", n & 0x0F),
        (0x64, 0x00) => "Error: Execution error".to_string(),
        (0x65, 0x81) => "Error: Memory failure".to_string(),
        (0x67, 0x00) => "Error: Wrong length".to_string(),
        (0x69, 0x00) => "Error: Command not allowed".to_string(),
        (0x69, 0x82) => "Error: Security status not satisfied".to_string(),
        (0x69, 0x83) => "Error: Authentication method blocked".to_string(),
        (0x69, 0x84) => "Error: Referenced data invalidated".to_string(),
        (0x69, 0x85) => "Error: Conditions of use not satisfied".to_string(),
        (0x6A, 0x80) => "Error: Incorrect parameters in data field".to_string(),
        (0x6A, 0x82) => "Error: Applet not found".to_string(),
        (0x6A, 0x84) => "Error: Not enough memory space".to_string(),
        (0x6A, 0x86) => "Error: Incorrect parameters P1-P2".to_string(),
        (0x6A, 0x88) => "Error: Referenced data not found".to_string(),
        (0x6B, 0x00) => "Error: Wrong parameter(s) P1-P2".to_string(),
        (0x6D, 0x00) => "Error: Instruction code not supported or invalid".to_string(),
        (0x6E, 0x00) => "Error: Class not supported".to_string(),
        (0x6F, 0x00) => "Error: No precise diagnosis".to_string(),
        _ => format!("Unknown status: {sw1:02X} {sw2:02X}"),
    }
}
