//! Document-style bodies.

use super::{read_parts, write_parts, BodyContext, BodyEncoding};
use crate::error::Result;
use crate::value::Value;
use crate::xml::{BodyReader, XmlWriter};

/// Each part is its own top-level body element, unless the message declares
/// a wrapper element, in which case parts go inside it.
///
/// Literal only: empty slots are left out of the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentEncoding;

impl DocumentEncoding {
    pub fn new() -> Self {
        Self
    }
}

impl BodyEncoding for DocumentEncoding {
    fn serialize_body(
        &self,
        writer: &mut XmlWriter,
        ctx: &BodyContext<'_>,
        return_value: Option<&Value>,
        parameters: &[Option<Value>],
    ) -> Result<()> {
        match &ctx.layout.wrapper {
            Some(wrapper) => {
                writer.start_element(&wrapper.name, &wrapper.namespace)?;
                write_parts(
                    writer,
                    ctx.layout,
                    return_value,
                    parameters,
                    &wrapper.namespace,
                    false,
                )?;
                writer.end_element()
            }
            None => write_parts(writer, ctx.layout, return_value, parameters, "", false),
        }
    }

    fn deserialize_body(
        &self,
        reader: &mut BodyReader,
        ctx: &BodyContext<'_>,
        parameters: &mut [Option<Value>],
    ) -> Result<Option<Value>> {
        match &ctx.layout.wrapper {
            Some(wrapper) => {
                let element = reader.read_expected(&wrapper.name, &wrapper.namespace)?;
                let mut inner = BodyReader::from_elements(element.into_child_elements());
                let result = read_parts(&mut inner, ctx.layout, parameters, false)?;
                inner.skip_to_end();
                Ok(result)
            }
            None => read_parts(reader, ctx.layout, parameters, false),
        }
    }
}
