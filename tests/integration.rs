//! Integration tests for opwire.
//!
//! These tests drive the formatter end to end: descriptions in, messages
//! and envelopes out, and back again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use bytes::Bytes;
use opwire::codec::{add_headers, get_headers, BodyContext, BodyEncoding, DocumentEncoding};
use opwire::contract::{ContractType, Member};
use opwire::description::{
    Direction, HeaderDescription, MessageDescription, OperationDescription, PartDescription,
    PropertyDescription, WILDCARD_ACTION,
};
use opwire::message::{BodyState, BodyWriter};
use opwire::value::slot_or_default;
use opwire::xml::{BodyReader, XmlWriter};
use opwire::{
    FormatterConfig, Message, MessageVersion, OperationFormatter, OpwireError, PartType, Value,
};
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

const REQUEST_ACTION: &str = "urn:lookup";
const REPLY_ACTION: &str = "urn:lookup/reply";

/// Two-way operation: `(id, name)` in, `(id, name)` out plus a text return value.
fn lookup() -> OperationDescription {
    OperationDescription::new("Lookup")
        .with_message(
            MessageDescription::new(REQUEST_ACTION, Direction::Input)
                .with_part(PartDescription::new("id", "", 0, PartType::Int))
                .with_part(PartDescription::new("name", "", 1, PartType::Text)),
        )
        .with_message(
            MessageDescription::new(REPLY_ACTION, Direction::Output)
                .with_return_value(PartDescription::new("", "", 0, PartType::Text))
                .with_part(PartDescription::new("id", "", 0, PartType::Int))
                .with_part(PartDescription::new("name", "", 1, PartType::Text)),
        )
}

fn text(bytes: &Bytes) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn args() -> Vec<Option<Value>> {
    vec![Some(Value::Int(42)), Some(Value::from("x"))]
}

// ============================================================================
// Round trips
// ============================================================================

/// Scenario: reply carries the return value and the out-params in place.
#[test]
fn test_reply_return_value_and_out_params() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();

    let reply = formatter
        .serialize_reply(MessageVersion::Soap11, &args(), Some(Value::from("ok")))
        .unwrap();
    assert_eq!(reply.action(), Some(REPLY_ACTION));

    let mut out = vec![None, None];
    let result = formatter.deserialize_reply(&reply, &mut out).unwrap();

    assert_eq!(result, Some(Value::from("ok")));
    assert_eq!(out, args());
}

#[test]
fn test_document_body_layout() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let reply = formatter
        .serialize_reply(MessageVersion::Soap11, &args(), Some(Value::from("ok")))
        .unwrap();

    let xml = text(&reply.write_message().unwrap());
    assert!(xml.contains("<s:Body><LookupResult>ok</LookupResult><id>42</id><name>x</name></s:Body>"));
}

#[test]
fn test_rpc_literal_roundtrip() {
    let formatter = OperationFormatter::builder(lookup()).rpc(true).build().unwrap();

    let request = formatter
        .serialize_request(MessageVersion::Soap11, &args())
        .unwrap();
    let xml = text(&request.write_message().unwrap());
    assert!(xml.contains("<Lookup><id>42</id><name>x</name></Lookup>"));

    let request = formatter
        .serialize_request(MessageVersion::Soap11, &args())
        .unwrap();
    let mut values = vec![None, None];
    formatter.deserialize_request(&request, &mut values).unwrap();
    assert_eq!(values, args());

    let reply = formatter
        .serialize_reply(MessageVersion::Soap11, &args(), Some(Value::from("ok")))
        .unwrap();
    let xml = text(&reply.write_message().unwrap());
    assert!(xml.contains("<LookupResponse><LookupResult>ok</LookupResult>"));
}

#[test]
fn test_rpc_encoded_roundtrip() {
    let formatter = OperationFormatter::builder(lookup())
        .rpc(true)
        .encoded(true)
        .build()
        .unwrap();
    let values = vec![Some(Value::Int(7)), None];

    let request = formatter
        .serialize_request(MessageVersion::Soap11, &values)
        .unwrap();
    let xml = text(&request.write_message().unwrap());
    assert!(xml.contains("xmlns:xsi="));
    assert!(xml.contains(r#"<id xsi:type="xsd:long">7</id>"#));
    assert!(xml.contains(r#"<name xsi:nil="true"/>"#));

    // Nil overwrites whatever the slot held
    let request = formatter
        .serialize_request(MessageVersion::Soap11, &values)
        .unwrap();
    let mut decoded = vec![None, Some(Value::from("stale"))];
    formatter.deserialize_request(&request, &mut decoded).unwrap();
    assert_eq!(decoded, values);
}

#[test]
fn test_envelope_roundtrip() {
    let op = OperationDescription::new("Lookup").with_message(
        MessageDescription::new(REQUEST_ACTION, Direction::Input)
            .with_header(HeaderDescription::new("tenant", "urn:h", 0, PartType::Text))
            .with_part(PartDescription::new("id", "urn:o", 1, PartType::Int)),
    );
    let formatter = OperationFormatter::builder(op).build().unwrap();
    let values = vec![Some(Value::from("acme")), Some(Value::Int(3))];

    let version = MessageVersion::Soap12WsAddressing10;
    let bytes = formatter
        .serialize_request(version, &values)
        .unwrap()
        .write_message()
        .unwrap();
    let xml = text(&bytes);
    assert!(xml.contains("<a:Action"));
    assert!(xml.contains(REQUEST_ACTION));

    let received = Message::read_message(&bytes, version).unwrap();
    assert_eq!(received.action(), Some(REQUEST_ACTION));

    let mut decoded = vec![None, None];
    formatter.deserialize_request(&received, &mut decoded).unwrap();
    assert_eq!(decoded, values);
}

#[test]
fn test_missing_parts_leave_slots_untouched() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let message = Message::from_body_bytes(MessageVersion::Soap11, Bytes::from_static(b"<id>5</id>"));

    let mut values = vec![None, Some(Value::from("kept"))];
    formatter.deserialize_request(&message, &mut values).unwrap();
    assert_eq!(values, vec![Some(Value::Int(5)), Some(Value::from("kept"))]);
}

/// Whether every element and attribute prefix in `bytes` resolves.
fn prefixes_declared(bytes: &[u8]) -> bool {
    let mut reader = NsReader::from_reader(bytes);
    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => {
                if matches!(ns, ResolveResult::Unknown(_)) {
                    return false;
                }
                for attr in e.attributes() {
                    let Ok(attr) = attr else {
                        return false;
                    };
                    if attr.key.as_namespace_binding().is_some() {
                        continue;
                    }
                    if matches!(reader.resolve_attribute(attr.key).0, ResolveResult::Unknown(_)) {
                        return false;
                    }
                }
            }
            Ok((_, Event::Eof)) => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

/// Scenario: an inbound encoded request is buffered and written back out.
/// Prefixes declared on the envelope and body stay declared.
#[test]
fn test_inbound_message_rewrites_with_declared_prefixes() {
    assert!(!prefixes_declared(br#"<a x:id="1"/>"#));

    let formatter = OperationFormatter::builder(lookup())
        .rpc(true)
        .encoded(true)
        .build()
        .unwrap();
    let version = MessageVersion::Soap11;
    let inbound = br#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" xmlns:w="urn:w"><s:Header><h:Ticket xmlns:h="urn:h" w:Id="x1">v</h:Ticket></s:Header><s:Body xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema"><Lookup><id xsi:type="xsd:long">7</id><name xsi:nil="true"/></Lookup></s:Body></s:Envelope>"#;
    assert!(prefixes_declared(inbound));

    let message = Message::read_message(inbound, version).unwrap();
    let buffer = message
        .create_buffered_copy(formatter.config().max_buffer_size)
        .unwrap();
    let bytes = buffer.create_message().unwrap().write_message().unwrap();

    assert!(prefixes_declared(&bytes), "{}", text(&bytes));
    assert!(text(&bytes).contains(r#"w:Id="x1""#));

    let received = Message::read_message(&bytes, version).unwrap();
    let mut decoded = vec![None, Some(Value::from("stale"))];
    formatter.deserialize_request(&received, &mut decoded).unwrap();
    assert_eq!(decoded, vec![Some(Value::Int(7)), None]);
}

#[test]
fn test_formatter_shared_across_threads() {
    let formatter = OperationFormatter::builder(lookup())
        .rpc(true)
        .encoded(true)
        .build()
        .unwrap();
    let version = MessageVersion::Soap11;

    std::thread::scope(|scope| {
        for worker in 0..4i64 {
            let formatter = &formatter;
            scope.spawn(move || {
                for i in 0..25i64 {
                    let values = vec![
                        Some(Value::Int(worker * 100 + i)),
                        Some(Value::from(format!("w{}", worker))),
                    ];
                    let bytes = formatter
                        .serialize_request(version, &values)
                        .unwrap()
                        .write_message()
                        .unwrap();
                    let received = Message::read_message(&bytes, version).unwrap();
                    let mut decoded = vec![None, None];
                    formatter.deserialize_request(&received, &mut decoded).unwrap();
                    assert_eq!(decoded, values);
                }
            });
        }
    });
}

// ============================================================================
// Actions and one-way operations
// ============================================================================

#[test]
fn test_wildcard_action_resolves_to_none() {
    let op = OperationDescription::new("Any").with_message(
        MessageDescription::new(WILDCARD_ACTION, Direction::Input)
            .with_part(PartDescription::new("v", "", 0, PartType::Bool)),
    );
    let formatter = OperationFormatter::builder(op).build().unwrap();
    assert_eq!(formatter.request_action(), None);

    let message = formatter
        .serialize_request(MessageVersion::Soap12WsAddressing10, &[Some(Value::Bool(true))])
        .unwrap();
    assert_eq!(message.action(), None);

    let xml = text(&message.write_message().unwrap());
    assert!(!xml.contains("Action"));
    assert!(!xml.contains("s:Header"));
}

/// Scenario: one-way operations have no reply side at all.
#[test]
fn test_one_way_operation() {
    let op = OperationDescription::new("Notify").with_message(
        MessageDescription::new("urn:notify", Direction::Input)
            .with_part(PartDescription::new("event", "", 0, PartType::Text)),
    );
    let formatter = OperationFormatter::builder(op).build().unwrap();

    assert!(formatter.is_one_way());
    assert_eq!(formatter.reply_action(), None);
    assert!(formatter.reply_layout().is_none());

    let err = formatter
        .serialize_reply(MessageVersion::Soap11, &[], None)
        .unwrap_err();
    assert!(matches!(err, OpwireError::InvalidState(_)));

    let err = formatter
        .deserialize_reply(&Message::empty(MessageVersion::Soap11), &mut [])
        .unwrap_err();
    assert!(matches!(err, OpwireError::InvalidState(_)));
}

// ============================================================================
// Error wrapping
// ============================================================================

#[test]
fn test_request_decode_failure_is_fault() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let message = Message::from_body_bytes(
        MessageVersion::Soap11,
        Bytes::from_static(b"<id>not a number</id>"),
    );

    let err = formatter
        .deserialize_request(&message, &mut [None, None])
        .unwrap_err();
    match err {
        OpwireError::Fault(fault) => assert!(fault.is_deserialization_failed()),
        other => panic!("expected fault, got {:?}", other),
    }
}

#[test]
fn test_malformed_request_is_fault() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let message = Message::from_body_bytes(MessageVersion::Soap11, Bytes::from_static(b"<id>1"));

    let err = formatter
        .deserialize_request(&message, &mut [None, None])
        .unwrap_err();
    assert!(matches!(err, OpwireError::Fault(ref f) if f.is_deserialization_failed()));
}

#[test]
fn test_reply_decode_failure_is_communication_error() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let message = Message::from_body_bytes(
        MessageVersion::Soap11,
        Bytes::from_static(b"<LookupResult>ok</LookupResult><id>x</id>"),
    );

    let err = formatter
        .deserialize_reply(&message, &mut [None, None])
        .unwrap_err();
    match err {
        OpwireError::Communication {
            operation,
            action,
            message,
            source,
        } => {
            assert_eq!(operation, "Lookup");
            assert_eq!(action.as_deref(), Some(REPLY_ACTION));
            assert!(message.contains("reply message for operation 'Lookup'"));
            assert!(source.is_decode_failure());
        }
        other => panic!("expected communication error, got {:?}", other),
    }
}

#[test]
fn test_encoded_type_mismatch_is_fault() {
    let formatter = OperationFormatter::builder(lookup())
        .rpc(true)
        .encoded(true)
        .build()
        .unwrap();
    let body = br#"<Lookup><id xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="xsd:string">1</id></Lookup>"#;
    let message = Message::from_body_bytes(MessageVersion::Soap11, Bytes::from_static(body));

    let err = formatter
        .deserialize_request(&message, &mut [None, None])
        .unwrap_err();
    assert!(matches!(err, OpwireError::Fault(_)));
}

#[test]
fn test_document_encoded_rejected() {
    let err = OperationFormatter::builder(lookup())
        .encoded(true)
        .build()
        .unwrap_err();
    assert!(matches!(err, OpwireError::Configuration { ref operation, .. } if operation == "Lookup"));
}

// ============================================================================
// Aggregate messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
struct Order {
    id: i64,
    trace: String,
    note: String,
}

fn order_description(contract: ContractType) -> OperationDescription {
    OperationDescription::new("PlaceOrder").with_message(order_message(
        "urn:order",
        Direction::Input,
        contract,
    ))
}

/// Typed request and typed reply.
fn order_exchange() -> OperationDescription {
    OperationDescription::new("PlaceOrder")
        .with_message(order_message("urn:order", Direction::Input, ContractType::of::<Order>()))
        .with_message(order_message(
            "urn:order/reply",
            Direction::Output,
            ContractType::of::<Order>(),
        ))
}

fn order_message(action: &str, direction: Direction, contract: ContractType) -> MessageDescription {
    MessageDescription::new(action, direction)
        .with_contract(contract)
        .with_header(
            HeaderDescription::new("id", "urn:h", 0, PartType::Int).with_member(
                Member::field::<Order>(
                    "id",
                    |o| Some(Value::Int(o.id)),
                    |o, v| {
                        o.id = slot_or_default(v)?;
                        Ok(())
                    },
                ),
            ),
        )
        .with_property(PropertyDescription::new("trace", 1).with_member(
            Member::property::<Order>(
                "trace",
                |o| Some(Value::Text(o.trace.clone())),
                |o, v| {
                    o.trace = slot_or_default(v)?;
                    Ok(())
                },
            ),
        ))
        .with_part(
            PartDescription::new("note", "urn:o", 2, PartType::Text).with_member(
                Member::field::<Order>(
                    "note",
                    |o| Some(Value::Text(o.note.clone())),
                    |o, v| {
                        o.note = slot_or_default(v)?;
                        Ok(())
                    },
                ),
            ),
        )
}

fn order() -> Order {
    Order {
        id: 11,
        trace: "t-1".into(),
        note: "rush".into(),
    }
}

/// Scenario: one header, one property and one body part on an aggregate.
#[test]
fn test_aggregate_accessor_table() {
    let formatter = OperationFormatter::builder(order_description(ContractType::of::<Order>()))
        .build()
        .unwrap();
    let table = formatter.request_accessors().unwrap();
    assert_eq!(table.len(), 3);

    let instance = Value::contract(order());
    let mut values = vec![None; 3];
    table
        .read_all(instance.as_contract().unwrap().as_contract(), &mut values)
        .unwrap();
    assert_eq!(
        values,
        vec![
            Some(Value::Int(11)),
            Some(Value::from("t-1")),
            Some(Value::from("rush")),
        ]
    );

    let mut fresh = opwire::contract::ContractInstance::new(Order::default());
    table.write_all(fresh.as_contract_mut(), values).unwrap();
    assert_eq!(fresh.downcast_ref::<Order>(), Some(&order()));
}

#[test]
fn test_aggregate_request_roundtrip() {
    let formatter = OperationFormatter::builder(order_description(ContractType::of::<Order>()))
        .build()
        .unwrap();

    let message = formatter
        .serialize_request(MessageVersion::Soap11, &[Some(Value::contract(order()))])
        .unwrap();
    assert_eq!(message.headers().len(), 1);
    assert_eq!(message.properties().get("trace"), Some(&Value::from("t-1")));

    let mut slots = vec![None];
    formatter.deserialize_request(&message, &mut slots).unwrap();

    let decoded = slots[0].as_ref().and_then(Value::as_contract).unwrap();
    assert_eq!(decoded.downcast_ref::<Order>(), Some(&order()));
}

#[test]
fn test_null_aggregate_rejected() {
    let formatter = OperationFormatter::builder(order_description(ContractType::of::<Order>()))
        .build()
        .unwrap();

    let err = formatter
        .serialize_request(MessageVersion::Soap11, &[None])
        .unwrap_err();
    assert!(matches!(err, OpwireError::Configuration { .. }));
    assert!(err.to_string().contains("cannot be null"));
}

#[test]
fn test_aggregate_without_default_constructor() {
    let formatter = OperationFormatter::builder(order_description(
        ContractType::without_default::<Order>(),
    ))
    .build()
    .unwrap();

    let message = formatter
        .serialize_request(MessageVersion::Soap11, &[Some(Value::contract(order()))])
        .unwrap();
    let err = formatter
        .deserialize_request(&message, &mut [None])
        .unwrap_err();
    assert!(matches!(err, OpwireError::Configuration { .. }));
}

/// Scenario: a typed reply goes out from the result value and comes back
/// as a new instance. Properties stay on the message and do not travel.
#[test]
fn test_aggregate_reply_roundtrip() {
    let formatter = OperationFormatter::builder(order_exchange()).build().unwrap();
    assert_eq!(formatter.reply_accessors().map(|t| t.len()), Some(3));
    let version = MessageVersion::Soap11;

    let reply = formatter
        .serialize_reply(version, &[], Some(Value::contract(order())))
        .unwrap();
    assert_eq!(reply.action(), Some("urn:order/reply"));
    assert_eq!(reply.headers().len(), 1);

    let result = formatter.deserialize_reply(&reply, &mut []).unwrap();
    let decoded = result.as_ref().and_then(Value::as_contract).unwrap();
    assert_eq!(decoded.downcast_ref::<Order>(), Some(&order()));

    let bytes = formatter
        .serialize_reply(version, &[], Some(Value::contract(order())))
        .unwrap()
        .write_message()
        .unwrap();
    let received = Message::read_message(&bytes, version).unwrap();
    let result = formatter.deserialize_reply(&received, &mut []).unwrap();
    let decoded = result.as_ref().and_then(Value::as_contract).unwrap();
    assert_eq!(
        decoded.downcast_ref::<Order>(),
        Some(&Order {
            trace: String::new(),
            ..order()
        })
    );
}

// ============================================================================
// Call ordering
// ============================================================================

/// Records each hook call and whether the property slot was already set.
#[derive(Debug, Default)]
struct RecordingEncoding {
    events: Mutex<Vec<String>>,
    inner: DocumentEncoding,
}

impl RecordingEncoding {
    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl BodyEncoding for RecordingEncoding {
    fn add_headers_to_message(
        &self,
        message: &mut Message,
        description: &MessageDescription,
        parameters: &[Option<Value>],
    ) -> opwire::Result<()> {
        let set = message.properties().get("trace").is_some();
        self.record(format!("add headers, property set: {}", set));
        add_headers(message, description, parameters);
        Ok(())
    }

    fn get_headers_from_message(
        &self,
        message: &Message,
        description: &MessageDescription,
        parameters: &mut [Option<Value>],
    ) -> opwire::Result<()> {
        let set = parameters[1].is_some();
        self.record(format!("get headers, property set: {}", set));
        get_headers(message, description, parameters)
    }

    fn serialize_body(
        &self,
        writer: &mut XmlWriter,
        ctx: &BodyContext<'_>,
        return_value: Option<&Value>,
        parameters: &[Option<Value>],
    ) -> opwire::Result<()> {
        self.record("write body");
        self.inner.serialize_body(writer, ctx, return_value, parameters)
    }

    fn deserialize_body(
        &self,
        reader: &mut BodyReader,
        ctx: &BodyContext<'_>,
        parameters: &mut [Option<Value>],
    ) -> opwire::Result<Option<Value>> {
        self.record("read body");
        self.inner.deserialize_body(reader, ctx, parameters)
    }
}

#[test]
fn test_properties_then_headers_then_body() {
    let op = OperationDescription::new("Audit").with_message(
        MessageDescription::new("urn:audit", Direction::Input)
            .with_header(HeaderDescription::new("id", "urn:h", 0, PartType::Int))
            .with_property(PropertyDescription::new("trace", 1))
            .with_part(PartDescription::new("note", "urn:o", 2, PartType::Text)),
    );
    let encoding = Arc::new(RecordingEncoding::default());
    let formatter = OperationFormatter::builder(op)
        .encoding(encoding.clone())
        .build()
        .unwrap();
    let values = vec![
        Some(Value::Int(3)),
        Some(Value::from("t-9")),
        Some(Value::from("hello")),
    ];

    let message = formatter
        .serialize_request(MessageVersion::Soap11, &values)
        .unwrap();
    assert_eq!(encoding.events(), vec!["add headers, property set: true"]);

    let mut decoded = vec![None; 3];
    formatter.deserialize_request(&message, &mut decoded).unwrap();
    assert_eq!(decoded, values);
    assert_eq!(
        encoding.events(),
        vec![
            "add headers, property set: true",
            "get headers, property set: true",
            "write body",
            "read body",
        ]
    );
}

// ============================================================================
// Empty bodies
// ============================================================================

#[derive(Debug, Default)]
struct CountingEncoding {
    reads: AtomicUsize,
    inner: DocumentEncoding,
}

impl BodyEncoding for CountingEncoding {
    fn serialize_body(
        &self,
        writer: &mut XmlWriter,
        ctx: &BodyContext<'_>,
        return_value: Option<&Value>,
        parameters: &[Option<Value>],
    ) -> opwire::Result<()> {
        self.inner.serialize_body(writer, ctx, return_value, parameters)
    }

    fn deserialize_body(
        &self,
        reader: &mut BodyReader,
        ctx: &BodyContext<'_>,
        parameters: &mut [Option<Value>],
    ) -> opwire::Result<Option<Value>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.deserialize_body(reader, ctx, parameters)
    }
}

#[test]
fn test_empty_body_skips_encoding() {
    let encoding = Arc::new(CountingEncoding::default());
    let formatter = OperationFormatter::builder(lookup())
        .encoding(encoding.clone())
        .build()
        .unwrap();

    let mut values = vec![Some(Value::Int(1)), None];
    formatter
        .deserialize_request(&Message::empty(MessageVersion::Soap11), &mut values)
        .unwrap();

    let blank = Message::from_body_bytes(MessageVersion::Soap11, Bytes::from_static(b" \n\t "));
    let result = formatter.deserialize_reply(&blank, &mut values).unwrap();

    assert_eq!(result, None);
    assert_eq!(values, vec![Some(Value::Int(1)), None]);
    assert_eq!(encoding.reads.load(Ordering::SeqCst), 0);

    let message = formatter
        .serialize_request(MessageVersion::Soap11, &args())
        .unwrap();
    formatter.deserialize_request(&message, &mut values).unwrap();
    assert_eq!(encoding.reads.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Lazy bodies and buffering
// ============================================================================

#[test]
fn test_serialize_is_lazy() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let message = formatter
        .serialize_request(MessageVersion::Soap11, &args())
        .unwrap();
    assert_eq!(message.state(), BodyState::Unwritten);

    message.write_message().unwrap();
    assert_eq!(message.state(), BodyState::Written);
    assert!(matches!(
        message.write_message(),
        Err(OpwireError::InvalidState(_))
    ));
}

#[test]
fn test_buffered_copy_is_idempotent() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let message = formatter
        .serialize_request(MessageVersion::Soap11, &args())
        .unwrap();

    // Buffering an unwritten message is allowed and runs the producer once
    assert_eq!(message.state(), BodyState::Unwritten);
    let max = formatter.config().max_buffer_size;
    let first = message.create_buffered_copy(max).unwrap();
    let second = message.create_buffered_copy(max).unwrap();
    assert!(first.buffer_size().is_some());
    assert_eq!(first.buffer_size(), second.buffer_size());
    assert_eq!(message.state(), BodyState::Buffered);
    assert_eq!(first.action(), Some(REQUEST_ACTION));

    let a = first.create_message().unwrap().write_message().unwrap();
    let b = second.create_message().unwrap().write_message().unwrap();
    assert_eq!(a, b);

    first.close();
    assert!(matches!(
        first.create_message(),
        Err(OpwireError::BufferDisposed)
    ));
}

/// Body producer that parks inside the write until released.
#[derive(Debug)]
struct GatedBody {
    entered: Barrier,
    release: Barrier,
}

impl BodyWriter for GatedBody {
    fn is_buffered(&self) -> bool {
        false
    }

    fn write_body_contents(&self, writer: &mut XmlWriter, _: MessageVersion) -> opwire::Result<()> {
        self.entered.wait();
        self.release.wait();
        writer.start_element("done", "")?;
        writer.text("ok")?;
        writer.end_element()
    }
}

#[test]
fn test_second_writer_rejected_while_first_in_flight() {
    let body = Arc::new(GatedBody {
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let message = Message::new(MessageVersion::Soap11, body.clone());

    std::thread::scope(|scope| {
        let first = scope.spawn(|| message.write_message());

        body.entered.wait();
        assert_eq!(message.state(), BodyState::Writing);
        assert!(matches!(
            message.write_message(),
            Err(OpwireError::InvalidState(_))
        ));
        assert!(matches!(
            message.create_buffered_copy(1024),
            Err(OpwireError::InvalidState(_))
        ));
        body.release.wait();

        let bytes = first.join().unwrap().unwrap();
        assert!(text(&bytes).contains("<done>ok</done>"));
    });
    assert_eq!(message.state(), BodyState::Written);
}

#[tokio::test]
async fn test_sync_and_async_writes_match() {
    let formatter = OperationFormatter::builder(lookup())
        .rpc(true)
        .encoded(true)
        .build()
        .unwrap();
    let version = MessageVersion::Soap12WsAddressing10;

    let sync = formatter
        .serialize_request(version, &args())
        .unwrap()
        .write_message()
        .unwrap();
    let not_sync = formatter
        .serialize_request(version, &args())
        .unwrap()
        .write_message_async()
        .await
        .unwrap();
    assert_eq!(sync, not_sync);
}

// ============================================================================
// Stream bodies
// ============================================================================

fn upload() -> OperationDescription {
    OperationDescription::new("Upload")
        .with_message(
            MessageDescription::new("urn:upload", Direction::Input)
                .with_part(PartDescription::new("data", "", 0, PartType::Stream)),
        )
        .with_message(
            MessageDescription::new("urn:upload/reply", Direction::Output)
                .with_return_value(PartDescription::new("", "", 0, PartType::Stream)),
        )
}

fn payload() -> Bytes {
    (0..1000u32).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
}

#[tokio::test]
async fn test_stream_body_sync_async_identical() {
    let formatter = OperationFormatter::builder(upload())
        .stream_chunk_size(4)
        .build()
        .unwrap();
    let values = vec![Some(Value::Bytes(payload()))];

    let sync = formatter
        .serialize_request(MessageVersion::Soap11, &values)
        .unwrap()
        .write_message()
        .unwrap();
    let not_sync = formatter
        .serialize_request(MessageVersion::Soap11, &values)
        .unwrap()
        .write_message_async()
        .await
        .unwrap();
    assert_eq!(sync, not_sync);

    let received = Message::read_message(&sync, MessageVersion::Soap11).unwrap();
    let mut decoded = vec![None];
    formatter.deserialize_request(&received, &mut decoded).unwrap();
    assert_eq!(decoded, values);
}

#[test]
fn test_stream_reply_return_value() {
    let formatter = OperationFormatter::builder(upload()).build().unwrap();
    let reply = formatter
        .serialize_reply(MessageVersion::Soap11, &[], Some(Value::Bytes(payload())))
        .unwrap();
    assert!(!reply.is_body_buffered());

    let result = formatter.deserialize_reply(&reply, &mut []).unwrap();
    assert_eq!(result, Some(Value::Bytes(payload())));
}

#[test]
fn test_empty_stream_body_yields_empty_payload() {
    let formatter = OperationFormatter::builder(upload()).build().unwrap();

    let mut values = vec![None];
    formatter
        .deserialize_request(&Message::empty(MessageVersion::Soap11), &mut values)
        .unwrap();
    assert_eq!(values, vec![Some(Value::Bytes(Bytes::new()))]);

    let result = formatter
        .deserialize_reply(&Message::empty(MessageVersion::Soap11), &mut [])
        .unwrap();
    assert_eq!(result, Some(Value::Bytes(Bytes::new())));
}

#[test]
fn test_stream_buffer_quota() {
    let formatter = OperationFormatter::builder(upload()).build().unwrap();
    let message = formatter
        .serialize_request(MessageVersion::Soap11, &[Some(Value::Bytes(payload()))])
        .unwrap();

    let err = message.create_buffered_copy(64).unwrap_err();
    assert!(matches!(err, OpwireError::QuotaExceeded { max: 64, .. }));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_formatter_from_json_config() {
    let config = FormatterConfig::from_json(
        r#"{ "is_rpc": true, "is_encoded": true, "stream_chunk_size": 10 }"#,
    )
    .unwrap();
    let formatter = OperationFormatter::new(lookup(), config).unwrap();

    assert!(formatter.config().is_encoded);
    assert_eq!(formatter.config().effective_chunk_size(), 9);
    assert_eq!(formatter.config().max_buffer_size, 64 * 1024);
}

#[test]
fn test_names_interned_once() {
    let formatter = OperationFormatter::builder(lookup()).build().unwrap();
    let request = formatter.request_layout();
    let reply = formatter.reply_layout().unwrap();

    assert!(request.parts[0].name.ptr_eq(&reply.parts[0].name));
    assert_eq!(formatter.request_action(), Some(REQUEST_ACTION));
    assert_eq!(formatter.reply_action(), Some(REPLY_ACTION));
}
