//! Envelope and addressing versions.

/// SOAP 1.1 envelope namespace.
pub const SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.2 envelope namespace.
pub const SOAP12_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WS-Addressing 1.0 namespace.
pub const ADDRESSING10_NAMESPACE: &str = "http://www.w3.org/2005/08/addressing";

/// Envelope version plus addressing version of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageVersion {
    /// SOAP 1.1, no addressing headers.
    Soap11,
    /// SOAP 1.2, no addressing headers.
    Soap12,
    /// SOAP 1.1 with WS-Addressing 1.0.
    Soap11WsAddressing10,
    /// SOAP 1.2 with WS-Addressing 1.0.
    #[default]
    Soap12WsAddressing10,
}

impl MessageVersion {
    #[inline]
    pub fn envelope_namespace(self) -> &'static str {
        match self {
            MessageVersion::Soap11 | MessageVersion::Soap11WsAddressing10 => SOAP11_NAMESPACE,
            MessageVersion::Soap12 | MessageVersion::Soap12WsAddressing10 => SOAP12_NAMESPACE,
        }
    }

    /// Addressing namespace, or `None` when actions are not sent as headers.
    #[inline]
    pub fn addressing_namespace(self) -> Option<&'static str> {
        match self {
            MessageVersion::Soap11 | MessageVersion::Soap12 => None,
            MessageVersion::Soap11WsAddressing10 | MessageVersion::Soap12WsAddressing10 => {
                Some(ADDRESSING10_NAMESPACE)
            }
        }
    }

    #[inline]
    pub fn is_soap11(self) -> bool {
        self.envelope_namespace() == SOAP11_NAMESPACE
    }

    /// Attribute naming a header's target: `actor` in 1.1, `role` in 1.2.
    #[inline]
    pub fn actor_attribute(self) -> &'static str {
        if self.is_soap11() {
            "actor"
        } else {
            "role"
        }
    }

    /// Wire form of a true `mustUnderstand`.
    #[inline]
    pub fn true_value(self) -> &'static str {
        if self.is_soap11() {
            "1"
        } else {
            "true"
        }
    }

    /// Whether headers can carry the `relay` attribute.
    #[inline]
    pub fn supports_relay(self) -> bool {
        !self.is_soap11()
    }
}
