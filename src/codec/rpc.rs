//! RPC-style bodies.

use quick_xml::events::BytesStart;

use super::{read_parts, write_parts, BodyContext, BodyEncoding};
use crate::error::{OpwireError, Result};
use crate::formatter::WrapperLayout;
use crate::message::MessageVersion;
use crate::value::Value;
use crate::xml::{BodyReader, XmlWriter, XSD_NAMESPACE, XSI_NAMESPACE};

/// Parts inside one wrapper element named after the operation.
///
/// In encoded mode every part carries an `xsi:type`, empty slots are written
/// as `xsi:nil`, and the body element declares the `xsi`/`xsd` prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcEncoding {
    encoded: bool,
}

impl RpcEncoding {
    pub fn new(encoded: bool) -> Self {
        Self { encoded }
    }

    /// RPC/literal.
    pub fn literal() -> Self {
        Self::new(false)
    }

    /// RPC/encoded.
    pub fn encoded() -> Self {
        Self::new(true)
    }

    #[inline]
    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    fn wrapper<'a>(&self, ctx: &BodyContext<'a>) -> Result<&'a WrapperLayout> {
        ctx.layout.wrapper.as_ref().ok_or_else(|| {
            OpwireError::configuration(ctx.operation, "rpc body has no wrapper element")
        })
    }
}

impl BodyEncoding for RpcEncoding {
    fn write_body_attributes(&self, start: &mut BytesStart<'_>, _version: MessageVersion) {
        if self.encoded {
            start.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
            start.push_attribute(("xmlns:xsd", XSD_NAMESPACE));
        }
    }

    fn serialize_body(
        &self,
        writer: &mut XmlWriter,
        ctx: &BodyContext<'_>,
        return_value: Option<&Value>,
        parameters: &[Option<Value>],
    ) -> Result<()> {
        let wrapper = self.wrapper(ctx)?;
        writer.start_element(&wrapper.name, &wrapper.namespace)?;
        write_parts(
            writer,
            ctx.layout,
            return_value,
            parameters,
            &wrapper.namespace,
            self.encoded,
        )?;
        writer.end_element()
    }

    fn deserialize_body(
        &self,
        reader: &mut BodyReader,
        ctx: &BodyContext<'_>,
        parameters: &mut [Option<Value>],
    ) -> Result<Option<Value>> {
        let wrapper = self.wrapper(ctx)?;
        let element = reader.read_expected(&wrapper.name, &wrapper.namespace)?;
        let mut inner = BodyReader::from_elements(element.into_child_elements());
        let result = read_parts(&mut inner, ctx.layout, parameters, self.encoded)?;
        inner.skip_to_end();
        Ok(result)
    }
}
