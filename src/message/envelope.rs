//! Envelope serialization.

use std::sync::Arc;

use bytes::Bytes;
use quick_xml::events::BytesStart;

use super::headers::ENVELOPE_PREFIX;
use super::{BufferedBodyWriter, Message, MessageHeaders, MessageVersion, XmlElementHeader};
use crate::error::{OpwireError, Result};
use crate::xml::{parse_elements, XmlWriter};

const ADDRESSING_PREFIX: &str = "a";

impl Message {
    /// Write the full envelope.
    pub fn write_message(&self) -> Result<Bytes> {
        let mut writer = XmlWriter::new();
        self.write_envelope_start(&mut writer)?;
        self.write_body_contents(&mut writer)?;
        finish_envelope(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Async counterpart of [`write_message`](Self::write_message). Produces
    /// the same bytes.
    pub async fn write_message_async(&self) -> Result<Bytes> {
        let mut writer = XmlWriter::new();
        self.write_envelope_start(&mut writer)?;
        self.write_body_contents_async(&mut writer).await?;
        finish_envelope(&mut writer)?;
        Ok(writer.into_bytes())
    }

    fn write_envelope_start(&self, writer: &mut XmlWriter) -> Result<()> {
        let version = self.version();
        let action = self.action();
        let addressing = version.addressing_namespace().filter(|_| action.is_some());

        let mut envelope = BytesStart::new(format!("{}:Envelope", ENVELOPE_PREFIX));
        envelope.push_attribute((
            format!("xmlns:{}", ENVELOPE_PREFIX).as_str(),
            version.envelope_namespace(),
        ));
        if let Some(ns) = addressing {
            envelope.push_attribute((format!("xmlns:{}", ADDRESSING_PREFIX).as_str(), ns));
        }
        writer.start(envelope)?;

        if addressing.is_some() || !self.headers().is_empty() {
            writer.start(BytesStart::new(format!("{}:Header", ENVELOPE_PREFIX)))?;
            if let (Some(_), Some(action)) = (addressing, action) {
                let mut start = BytesStart::new(format!("{}:Action", ADDRESSING_PREFIX));
                start.push_attribute((
                    format!("{}:mustUnderstand", ENVELOPE_PREFIX).as_str(),
                    version.true_value(),
                ));
                writer.start(start)?;
                writer.text(action)?;
                writer.end_element()?;
            }
            for header in self.headers().iter() {
                header.write_header(writer, version)?;
            }
            writer.end_element()?;
        }

        let mut body = BytesStart::new(format!("{}:Body", ENVELOPE_PREFIX));
        self.write_body_attributes(&mut body);
        writer.start(body)
    }

    /// Parse an envelope written with `version`.
    ///
    /// Headers come back as [`XmlElementHeader`]s, the addressing action as
    /// the message action, and the body as buffered contents.
    pub fn read_message(bytes: &[u8], version: MessageVersion) -> Result<Message> {
        let envelope_ns = version.envelope_namespace();
        let mut roots = parse_elements(bytes)?;
        if roots.len() != 1 {
            return Err(OpwireError::MalformedXml(format!(
                "expected one envelope element, found {}",
                roots.len()
            )));
        }
        let envelope = roots.remove(0);
        if !envelope.is("Envelope", envelope_ns) {
            return Err(OpwireError::Serialization(format!(
                "Expecting element 'Envelope' from namespace '{}'. Encountered '{}' from namespace '{}'",
                envelope_ns, envelope.name, envelope.namespace
            )));
        }

        // Prefixes declared above a header or the body stay in scope for
        // their contents, so they travel with them.
        let envelope_scope = envelope.namespaces.clone();
        let mut headers = MessageHeaders::new();
        let mut body = None;
        for mut child in envelope.into_child_elements() {
            child.inherit_namespaces(&envelope_scope);
            if child.is("Header", envelope_ns) {
                let header_scope = std::mem::take(&mut child.namespaces);
                for mut header in child.into_child_elements() {
                    header.inherit_namespaces(&header_scope);
                    let is_action = header.name == "Action"
                        && version.addressing_namespace() == Some(header.namespace.as_str());
                    if is_action {
                        headers.set_action(Some(header.text().trim().to_string()));
                    } else {
                        headers.add(XmlElementHeader::from_element(header));
                    }
                }
            } else if child.is("Body", envelope_ns) {
                body = Some(child);
            }
        }

        let body = body.ok_or_else(|| {
            OpwireError::Serialization("envelope has no Body element".to_string())
        })?;
        let mut contents = XmlWriter::new();
        body.write_children(&mut contents, "")?;
        let attributes = body
            .namespaces
            .iter()
            .filter(|(prefix, _)| prefix != ENVELOPE_PREFIX)
            .map(|(prefix, uri)| (format!("xmlns:{}", prefix), uri.clone()))
            .chain(body.attributes.iter().cloned())
            .collect();
        let writer = BufferedBodyWriter::with_attributes(contents.into_bytes(), attributes);

        Ok(Message::new(version, Arc::new(writer)).with_headers(headers))
    }
}

fn finish_envelope(writer: &mut XmlWriter) -> Result<()> {
    writer.end_element()?;
    writer.end_element()
}
