//! Sign-on security return codes.
//!
//! The sign-on and start-server replies carry a 32-bit return code. The high
//! half groups the failure (request data, user id, password, server, exit
//! program, token, identity mapping); the low half picks the reason.

/// Message for codes missing from the table
pub const UNKNOWN_ERROR: &str = "Unknown error";

pub const USER_ID_UNKNOWN: u32 = 0x0002_0001;
pub const USER_ID_DISABLED: u32 = 0x0002_0002;
pub const PASSWORD_INCORRECT: u32 = 0x0003_000B;
pub const PASSWORD_INCORRECT_DISABLE: u32 = 0x0003_000C;
pub const PASSWORD_EXPIRED: u32 = 0x0003_000D;
pub const PASSWORD_NONE: u32 = 0x0003_0010;

/// Human-readable text for a host return code.
pub fn message_for(code: u32) -> &'static str {
    match code {
        0x0001_0001 => "Invalid random seed exchange",
        0x0001_0002 => "Service ID is not valid",
        0x0001_0003 => "Request ID is not valid",
        0x0001_0004 => "Invalid random seed",
        0x0001_0005 => "Random seed required",
        0x0001_0006 => "Password encrypt invalid",
        0x0001_0007 => "User ID length not valid",
        0x0001_0008 => "Password length not valid",
        0x0001_0009 => "Request data error",
        0x0001_000A => "Request data error",
        0x0001_000B => "Signon request not valid",
        0x0001_000C => "Password change request not valid",
        0x0001_000D => "Old password not valid",
        0x0001_000E => "New password not valid",
        0x0001_000F => "Token type not valid",
        0x0001_0010 => "Generate token request not valid",
        0x0001_0011 => "Token length not valid",
        0x0001_0012 => "Generate token request not valid",
        0x0002_0001 => "Unknown user ID",
        0x0002_0002 => "User ID is disabled",
        0x0002_0003 => "Profile mismatch",
        0x0003_0001 => "New password too long",
        0x0003_0002 => "New password too short",
        0x0003_0003 => "New password has repeating characters",
        0x0003_0004 => "New password has adjacent digits",
        0x0003_0005 => "New password has consecutively repeating characters",
        0x0003_0006 => "New password previously used",
        0x0003_0007 => "New password does not contain any digits",
        0x0003_0008 => "New password contains an invalid character",
        0x0003_0009 => "New password is not allowed",
        0x0003_000A => "New password contains user ID",
        0x0003_000B => "Incorrect password",
        0x0003_000C => "Incorrect password, user ID will be disabled on the next incorrect password",
        0x0003_000D => "Password expired",
        0x0003_000E => "Encrypted password is pre V2R2",
        0x0003_000F => "New password has character in same position as old",
        0x0003_0010 => "Password is *NONE",
        0x0003_0011 => "New password failed validation",
        0x0003_0012 => "Password change not allowed",
        0x0003_0013 => "Password value is not valid",
        0x0004_0000 => "General security error",
        0x0004_0001 => "Function not performed due to data length",
        0x0004_0002 => "Function not performed due to server job timeout",
        0x0004_0003 => "Function not performed due to server job not started",
        0x0004_0004 => "Function not performed due to server prestart job not started",
        0x0004_0005 => "Function not performed due to sub-system error",
        0x0004_0006 => "Function not performed due to server job ending",
        0x0004_0007 => "Function not performed due to receiver area too small",
        0x0004_0008 => "Function not performed due to unknown error",
        0x0004_0009 => "Function not performed, user profile does not exist for the server job",
        0x0004_000A => "Function not performed due to authority issues for the server job",
        0x0004_000B => "Function not performed due to server job program not found",
        0x0004_000C => "Function not performed because the daemon job is not authorized to use the library that contains the server job",
        0x0004_000D => "Function not performed because the daemon job is not authorized to the server job program",
        0x0004_000E => "Function not performed because user not authorized to generate token for another user",
        0x0004_000F => "Function not performed due to lack of memory for authorization",
        0x0004_0010 => "Function not performed due to codepage conversion error",
        0x0004_0011 => "Function not performed due to EIM interface error",
        0x0004_0012 => "Function not performed due to cryptographic error",
        0x0004_0013 => "Function not performed due to token version error",
        0x0004_0014 => "Function not performed due to public key not found",
        0x0005_0001 => "Error processing exit point",
        0x0005_0002 => "Resolving to exit point",
        0x0005_0003 => "Exit program call error",
        0x0005_0004 => "Error program denied request",
        0x0006_0001 => "Profile token not valid",
        0x0006_0002 => "Maximum number of profile tokens reached",
        0x0006_0003 => "Profile token timeout not valid",
        0x0006_0004 => "Profile token type not valid",
        0x0006_0005 => "Profile token not regenerable",
        0x0006_0006 => "Kerberos ticket not consistent",
        0x0006_0007 => "Invalid mechanism for kerberos ticket",
        0x0006_0008 => "Invalid credentials for kerberos ticket",
        0x0006_0009 => "Invalid signature for kerberos ticket",
        0x0006_000A => "Credentials no longer valid for kerberos ticket",
        0x0006_000B => "Kerberos ticket not consistent",
        0x0006_000C => "Verification failed for kerberos ticket",
        0x0006_000D => "Invalid EIM identifier for kerberos ticket",
        0x0006_000E => "Kerberos ticket invalid due to invalid system profile",
        0x0006_000F => "Kerberos ticket invalid due to multiple profiles mapped",
        0x0007_0001 => "Can not connect to EIM system domain",
        0x0007_0002 => "Can not change the CCSID for EIM request",
        0x0007_0003 => "Can not obtain the EIM registry name",
        0x0007_0004 => "Can not map token",
        _ => UNKNOWN_ERROR,
    }
}
