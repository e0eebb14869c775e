// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP/1.1 binary codec (RFC 8010 §3). Parser and serialiser are pure
// functions over byte slices -- no I/O, no async -- so they unit-test
// without a server.

use thermal_core::error::{Result, ThermalError};

// ---------------------------------------------------------------------------
// Delimiter tags (RFC 8010 §3.5.1)
// ---------------------------------------------------------------------------

pub const TAG_OPERATION_ATTRIBUTES: u8 = 0x01;
pub const TAG_JOB_ATTRIBUTES: u8 = 0x02;
pub const TAG_END_OF_ATTRIBUTES: u8 = 0x03;
pub const TAG_PRINTER_ATTRIBUTES: u8 = 0x04;
pub const TAG_UNSUPPORTED_ATTRIBUTES: u8 = 0x05;

// ---------------------------------------------------------------------------
// Value tags (RFC 8010 §3.5.2)
// ---------------------------------------------------------------------------

pub const VALUE_TAG_INTEGER: u8 = 0x21;
pub const VALUE_TAG_BOOLEAN: u8 = 0x22;
pub const VALUE_TAG_ENUM: u8 = 0x23;
pub const VALUE_TAG_OCTET_STRING: u8 = 0x30;
pub const VALUE_TAG_RESOLUTION: u8 = 0x32;
pub const VALUE_TAG_RANGE_OF_INTEGER: u8 = 0x33;
pub const VALUE_TAG_TEXT: u8 = 0x41;
pub const VALUE_TAG_NAME: u8 = 0x42;
pub const VALUE_TAG_KEYWORD: u8 = 0x44;
pub const VALUE_TAG_URI: u8 = 0x45;
pub const VALUE_TAG_CHARSET: u8 = 0x47;
pub const VALUE_TAG_NATURAL_LANGUAGE: u8 = 0x48;
pub const VALUE_TAG_MIME_MEDIA_TYPE: u8 = 0x49;

// ---------------------------------------------------------------------------
// Parsed attributes
// ---------------------------------------------------------------------------

/// A single parsed IPP attribute. `name` is empty for additional values of a
/// preceding 1setOf attribute (RFC 8010 §3.1.4).
#[derive(Debug, Clone)]
pub struct IppAttribute {
    pub value_tag: u8,
    pub name: String,
    pub value: Vec<u8>,
}

/// A group of attributes delimited by a group tag.
#[derive(Debug, Clone, Default)]
pub struct IppAttributeGroup {
    pub attributes: Vec<IppAttribute>,
}

impl IppAttributeGroup {
    fn get(&self, name: &str) -> Option<&IppAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|a| String::from_utf8(a.value.clone()).ok())
    }

    pub fn get_integer(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|a| {
            (a.value.len() == 4).then(|| i32::from_be_bytes(a.value[..4].try_into().unwrap()))
        })
    }

    /// All values (including multi-value continuations) of a named keyword
    /// or text-like attribute, in wire order.
    pub fn get_all_strings(&self, name: &str) -> Vec<String> {
        let mut found = false;
        let mut out = Vec::new();
        for attr in &self.attributes {
            if !found {
                if attr.name == name {
                    found = true;
                } else {
                    continue;
                }
            } else if !attr.name.is_empty() {
                break;
            }
            if let Ok(s) = String::from_utf8(attr.value.clone()) {
                out.push(s);
            }
        }
        out
    }
}

/// A fully parsed IPP request or response message.
///
/// `op_or_status` is the operation-id on a request, the status-code on a
/// response -- the wire layout is identical (RFC 8010 §3.1.1/§3.1.2), only
/// the interpretation differs by direction.
#[derive(Debug, Clone)]
pub struct IppMessage {
    pub version_major: u8,
    pub version_minor: u8,
    pub op_or_status: u16,
    pub request_id: u32,
    pub operation_attrs: IppAttributeGroup,
    pub job_attrs: Vec<IppAttributeGroup>,
    pub printer_attrs: IppAttributeGroup,
    pub unsupported_attrs: IppAttributeGroup,
    pub body: Vec<u8>,
}

/// Parse a raw IPP message body (RFC 8010 §3.1).
///
/// ```text
/// version-number:  2 bytes (major, minor)
/// op-or-status:    2 bytes (big-endian u16)
/// request-id:      4 bytes (big-endian u32)
/// attribute-groups: variable
///   delimiter-tag: 1 byte
///   attributes:    variable
///     value-tag:    1 byte
///     name-length:  2 bytes (big-endian u16)
///     name:         name-length bytes
///     value-length: 2 bytes (big-endian u16)
///     value:        value-length bytes
/// end-of-attributes-tag: 1 byte (0x03)
/// body: remainder
/// ```
pub fn parse(data: &[u8]) -> Result<IppMessage> {
    if data.len() < 8 {
        return Err(ThermalError::BadRequest(format!(
            "message too short: {} bytes (minimum 8)",
            data.len()
        )));
    }

    let version_major = data[0];
    let version_minor = data[1];
    let op_or_status = u16::from_be_bytes([data[2], data[3]]);
    let request_id = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    let mut pos = 8;
    let mut operation_attrs = IppAttributeGroup::default();
    let mut job_attrs = Vec::new();
    let mut printer_attrs = IppAttributeGroup::default();
    let mut unsupported_attrs = IppAttributeGroup::default();
    let mut current: Option<(u8, IppAttributeGroup)> = None;

    let flush = |current: &mut Option<(u8, IppAttributeGroup)>,
                 operation_attrs: &mut IppAttributeGroup,
                 job_attrs: &mut Vec<IppAttributeGroup>,
                 printer_attrs: &mut IppAttributeGroup,
                 unsupported_attrs: &mut IppAttributeGroup| {
        if let Some((tag, group)) = current.take() {
            match tag {
                TAG_OPERATION_ATTRIBUTES => *operation_attrs = group,
                TAG_JOB_ATTRIBUTES => job_attrs.push(group),
                TAG_PRINTER_ATTRIBUTES => *printer_attrs = group,
                TAG_UNSUPPORTED_ATTRIBUTES => *unsupported_attrs = group,
                _ => {}
            }
        }
    };

    while pos < data.len() {
        let tag = data[pos];

        if tag <= 0x0F {
            flush(
                &mut current,
                &mut operation_attrs,
                &mut job_attrs,
                &mut printer_attrs,
                &mut unsupported_attrs,
            );
            if tag == TAG_END_OF_ATTRIBUTES {
                pos += 1;
                break;
            }
            current = Some((tag, IppAttributeGroup::default()));
            pos += 1;
            continue;
        }

        let value_tag = tag;
        let Some((_, group)) = current.as_mut() else {
            return Err(ThermalError::BadRequest(
                "attribute encountered before any group delimiter".into(),
            ));
        };
        pos += 1;

        if pos + 2 > data.len() {
            return Err(ThermalError::BadRequest("truncated name-length field".into()));
        }
        let name_length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;

        if pos + name_length > data.len() {
            return Err(ThermalError::BadRequest("attribute name overruns buffer".into()));
        }
        let name = String::from_utf8_lossy(&data[pos..pos + name_length]).to_string();
        pos += name_length;

        if pos + 2 > data.len() {
            return Err(ThermalError::BadRequest("truncated value-length field".into()));
        }
        let value_length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += 2;

        if pos + value_length > data.len() {
            return Err(ThermalError::BadRequest("attribute value overruns buffer".into()));
        }
        let value = data[pos..pos + value_length].to_vec();
        pos += value_length;

        group.attributes.push(IppAttribute { value_tag, name, value });
    }

    flush(
        &mut current,
        &mut operation_attrs,
        &mut job_attrs,
        &mut printer_attrs,
        &mut unsupported_attrs,
    );

    let body = data[pos..].to_vec();

    Ok(IppMessage {
        version_major,
        version_minor,
        op_or_status,
        request_id,
        operation_attrs,
        job_attrs,
        printer_attrs,
        unsupported_attrs,
        body,
    })
}

// ---------------------------------------------------------------------------
// Serialiser
// ---------------------------------------------------------------------------

/// Builder for IPP response messages (RFC 8010 §3.1.2, §3.4).
///
/// Always writes version `2.1`; the operation-attributes group
/// (`attributes-charset`, `attributes-natural-language`) must be opened
/// first via [`IppResponseBuilder::begin_operation_attrs`] before any other
/// group, matching the serialiser contract.
pub struct IppResponseBuilder {
    buf: Vec<u8>,
}

impl IppResponseBuilder {
    pub fn new(status_code: u16, request_id: u32) -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.push(2);
        buf.push(1);
        buf.extend_from_slice(&status_code.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        Self { buf }
    }

    /// Open the operation-attributes group and write the two attributes
    /// every IPP response carries first.
    pub fn begin_operation_attrs(mut self) -> Self {
        self.buf.push(TAG_OPERATION_ATTRIBUTES);
        self.write_attr(VALUE_TAG_CHARSET, "attributes-charset", b"utf-8");
        self.write_attr(VALUE_TAG_NATURAL_LANGUAGE, "attributes-natural-language", b"en");
        self
    }

    pub fn begin_group(mut self, delimiter: u8) -> Self {
        self.buf.push(delimiter);
        self
    }

    pub fn text(self, name: &str, value: &str) -> Self {
        self.attr(VALUE_TAG_TEXT, name, value.as_bytes())
    }

    pub fn name_attr(self, name: &str, value: &str) -> Self {
        self.attr(VALUE_TAG_NAME, name, value.as_bytes())
    }

    pub fn keyword(self, name: &str, value: &str) -> Self {
        self.attr(VALUE_TAG_KEYWORD, name, value.as_bytes())
    }

    /// Additional value of a preceding 1setOf keyword (name-length = 0).
    pub fn keyword_additional(self, value: &str) -> Self {
        self.attr(VALUE_TAG_KEYWORD, "", value.as_bytes())
    }

    pub fn uri(self, name: &str, value: &str) -> Self {
        self.attr(VALUE_TAG_URI, name, value.as_bytes())
    }

    pub fn mime_media_type(self, name: &str, value: &str) -> Self {
        self.attr(VALUE_TAG_MIME_MEDIA_TYPE, name, value.as_bytes())
    }

    pub fn mime_media_type_additional(self, value: &str) -> Self {
        self.attr(VALUE_TAG_MIME_MEDIA_TYPE, "", value.as_bytes())
    }

    pub fn integer(self, name: &str, value: i32) -> Self {
        self.attr(VALUE_TAG_INTEGER, name, &value.to_be_bytes())
    }

    pub fn integer_additional(self, value: i32) -> Self {
        self.attr(VALUE_TAG_INTEGER, "", &value.to_be_bytes())
    }

    pub fn enum_attr(self, name: &str, value: i32) -> Self {
        self.attr(VALUE_TAG_ENUM, name, &value.to_be_bytes())
    }

    /// Additional value of a preceding 1setOf enum (name-length = 0).
    pub fn enum_additional(self, value: i32) -> Self {
        self.attr(VALUE_TAG_ENUM, "", &value.to_be_bytes())
    }

    pub fn boolean(self, name: &str, value: bool) -> Self {
        self.attr(VALUE_TAG_BOOLEAN, name, &[value as u8])
    }

    /// `resolution`: cross-feed, feed, and unit (3 = dpi) (RFC 8010 §3.5.2).
    pub fn resolution(self, name: &str, xfeed: i32, feed: i32, unit: u8) -> Self {
        let mut value = Vec::with_capacity(9);
        value.extend_from_slice(&xfeed.to_be_bytes());
        value.extend_from_slice(&feed.to_be_bytes());
        value.push(unit);
        self.attr(VALUE_TAG_RESOLUTION, name, &value)
    }

    /// `rangeOfInteger`: lower and upper bound, inclusive.
    pub fn range_of_integer(self, name: &str, lo: i32, hi: i32) -> Self {
        let mut value = Vec::with_capacity(8);
        value.extend_from_slice(&lo.to_be_bytes());
        value.extend_from_slice(&hi.to_be_bytes());
        self.attr(VALUE_TAG_RANGE_OF_INTEGER, name, &value)
    }

    fn attr(mut self, value_tag: u8, name: &str, value: &[u8]) -> Self {
        self.write_attr(value_tag, name, value);
        self
    }

    fn write_attr(&mut self, value_tag: u8, name: &str, value: &[u8]) {
        self.buf.push(value_tag);
        let name_bytes = name.as_bytes();
        self.buf.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(name_bytes);
        self.buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(value);
    }

    pub fn build(mut self) -> Vec<u8> {
        self.buf.push(TAG_END_OF_ATTRIBUTES);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_attr(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) {
        buf.push(value_tag);
        buf.extend_from_slice(&(name.len() as u16).to_be_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value);
    }

    fn build_request(op: u16, request_id: u32) -> Vec<u8> {
        let mut buf = vec![2, 1];
        buf.extend_from_slice(&op.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        buf.push(TAG_OPERATION_ATTRIBUTES);
        write_attr(&mut buf, VALUE_TAG_CHARSET, "attributes-charset", b"utf-8");
        write_attr(&mut buf, VALUE_TAG_NATURAL_LANGUAGE, "attributes-natural-language", b"en");
        write_attr(&mut buf, VALUE_TAG_URI, "printer-uri", b"ipp://host:631/ipp/printer");
        buf.push(TAG_END_OF_ATTRIBUTES);
        buf
    }

    #[test]
    fn parses_operation_attributes() {
        let msg = parse(&build_request(0x000B, 1)).unwrap();
        assert_eq!(msg.version_major, 2);
        assert_eq!(msg.op_or_status, 0x000B);
        assert_eq!(msg.request_id, 1);
        assert_eq!(
            msg.operation_attrs.get_string("printer-uri").as_deref(),
            Some("ipp://host:631/ipp/printer")
        );
    }

    #[test]
    fn rejects_short_message() {
        assert!(parse(&[1, 2, 3]).is_err());
    }

    #[test]
    fn rejects_truncated_length_field() {
        let mut buf = vec![2, 1, 0, 0x0B, 0, 0, 0, 1, TAG_OPERATION_ATTRIBUTES, VALUE_TAG_URI];
        buf.push(0);
        // only one byte of the two-byte name-length field follows
        assert!(parse(&buf).is_err());
    }

    #[test]
    fn rejects_attribute_before_any_group() {
        let mut buf = vec![2, 1, 0, 0x0B, 0, 0, 0, 1];
        write_attr(&mut buf, VALUE_TAG_URI, "printer-uri", b"x");
        assert!(parse(&buf).is_err());
    }

    #[test]
    fn multi_value_keyword_round_trips() {
        let mut buf = vec![2, 1, 0, 2, 0, 0, 0, 7, TAG_OPERATION_ATTRIBUTES];
        write_attr(&mut buf, VALUE_TAG_KEYWORD, "which-jobs", b"completed");
        write_attr(&mut buf, VALUE_TAG_KEYWORD, "", b"not-completed");
        buf.push(TAG_END_OF_ATTRIBUTES);
        let msg = parse(&buf).unwrap();
        assert_eq!(
            msg.operation_attrs.get_all_strings("which-jobs"),
            vec!["completed", "not-completed"]
        );
    }

    #[test]
    fn serialiser_round_trips_integer_and_keyword() {
        let bytes = IppResponseBuilder::new(0x0000, 42)
            .begin_operation_attrs()
            .begin_group(TAG_JOB_ATTRIBUTES)
            .integer("job-id", 7)
            .keyword("job-state-reasons", "job-queued")
            .build();
        let msg = parse(&bytes).unwrap();
        assert_eq!(msg.op_or_status, 0x0000);
        assert_eq!(msg.request_id, 42);
        assert_eq!(msg.job_attrs[0].get_integer("job-id"), Some(7));
        assert_eq!(
            msg.job_attrs[0].get_string("job-state-reasons").as_deref(),
            Some("job-queued")
        );
    }

    #[test]
    fn unknown_tag_round_trips_as_bytes() {
        let mut buf = vec![2, 1, 0, 0x0B, 0, 0, 0, 1, TAG_OPERATION_ATTRIBUTES];
        write_attr(&mut buf, 0x7F, "vendor-extension", &[0xDE, 0xAD]);
        buf.push(TAG_END_OF_ATTRIBUTES);
        let msg = parse(&buf).unwrap();
        assert_eq!(
            msg.operation_attrs.get("vendor-extension").unwrap().value,
            vec![0xDE, 0xAD]
        );
    }
}
