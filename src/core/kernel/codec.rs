use crate::core::errors::{DecodeError, OmmError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

/// One XML element: a tag, its attributes in document order, and child elements.
///
/// AXI documents are flat records with at most one level of nested children,
/// and character data is never significant, so text nodes are not kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Raw value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Parse exactly one XML document into an element tree.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::from_start(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| {
                        DecodeError::Malformed("closing tag without opening tag".to_string())
                    })?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(DecodeError::Malformed(format!(
                        "{} at byte {}",
                        e,
                        reader.buffer_position()
                    )))
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(DecodeError::Malformed(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        root.ok_or_else(|| DecodeError::Malformed("document has no root element".to_string()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut element = Self::new(name);
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| {
                DecodeError::Malformed(format!("bad attribute on <{}>: {}", element.name, e))
            })?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| DecodeError::InvalidValue {
                    element: element.name.clone(),
                    attribute: key.clone(),
                    value: String::from_utf8_lossy(&attribute.value).into_owned(),
                    reason: e.to_string(),
                })?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    fn attach(
        stack: &mut [Element],
        root: &mut Option<Element>,
        element: Element,
    ) -> Result<(), DecodeError> {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(element);
            return Ok(());
        }
        if root.is_some() {
            return Err(DecodeError::Malformed(format!(
                "second root element <{}>",
                element.name
            )));
        }
        *root = Some(element);
        Ok(())
    }

    /// Serialize this element as a standalone document.
    pub fn to_xml(&self) -> Result<String, OmmError> {
        let mut writer = Writer::new(Vec::new());
        self.write(&mut writer)
            .map_err(|e| OmmError::EncodeError(e.to_string()))?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| OmmError::EncodeError(e.to_string()))
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> quick_xml::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            child.write(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// Scalar conversion between a field value and its attribute text.
pub trait WireValue: Sized {
    fn to_wire(&self) -> String;
    fn from_wire(raw: &str) -> Result<Self, String>;
}

impl WireValue for String {
    fn to_wire(&self) -> String {
        self.clone()
    }

    fn from_wire(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

macro_rules! numeric_wire_value {
    ($($ty:ty),+) => {
        $(
            impl WireValue for $ty {
                fn to_wire(&self) -> String {
                    self.to_string()
                }

                fn from_wire(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )+
    };
}

numeric_wire_value!(i32, u32, i64, u64, u16);

/// How a particular boolean field is spelled on the wire.
///
/// The controller does not use a single convention; each field declares its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolStyle {
    /// `"1"` / `"0"` only
    Digit,
    /// `"true"` / `"false"` only
    Word,
    /// XML schema boolean: written as `"true"` / `"false"`, read from either spelling
    Schema,
}

impl BoolStyle {
    pub const fn encode(self, value: bool) -> &'static str {
        match (self, value) {
            (Self::Digit, true) => "1",
            (Self::Digit, false) => "0",
            (Self::Word | Self::Schema, true) => "true",
            (Self::Word | Self::Schema, false) => "false",
        }
    }

    pub fn decode(self, raw: &str) -> Option<bool> {
        match (self, raw) {
            (Self::Digit | Self::Schema, "1") | (Self::Word | Self::Schema, "true") => Some(true),
            (Self::Digit | Self::Schema, "0") | (Self::Word | Self::Schema, "false") => {
                Some(false)
            }
            _ => None,
        }
    }
}

/// A record that maps to one XML element.
pub trait WireElement: Sized {
    /// Element name on the wire.
    const TAG: &'static str;

    fn to_element(&self) -> Element;

    fn from_element(element: &Element) -> Result<Self, DecodeError>;

    fn encode(&self) -> Result<String, OmmError> {
        self.to_element().to_xml()
    }

    fn decode(text: &str) -> Result<Self, DecodeError> {
        Self::from_element(&Element::parse(text)?)
    }
}

/// Builds an element field by field, in declaration order.
#[derive(Debug)]
pub struct ElementBuilder {
    element: Element,
}

impl ElementBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            element: Element::new(name),
        }
    }

    pub fn attr<T: WireValue>(mut self, name: &str, value: &T) -> Self {
        self.element.attributes.push((name.to_string(), value.to_wire()));
        self
    }

    /// Emitted only when present.
    pub fn opt_attr<T: WireValue>(self, name: &str, value: Option<&T>) -> Self {
        match value {
            Some(value) => self.attr(name, value),
            None => self,
        }
    }

    pub fn flag(mut self, name: &str, value: bool, style: BoolStyle) -> Self {
        self.element
            .attributes
            .push((name.to_string(), style.encode(value).to_string()));
        self
    }

    /// Emitted only when present.
    pub fn opt_flag(self, name: &str, value: Option<bool>, style: BoolStyle) -> Self {
        match value {
            Some(value) => self.flag(name, value, style),
            None => self,
        }
    }

    /// Comma-separated list in one attribute.
    pub fn packed<T: WireValue>(mut self, name: &str, values: &[T]) -> Self {
        let joined = values
            .iter()
            .map(WireValue::to_wire)
            .collect::<Vec<_>>()
            .join(",");
        self.element.attributes.push((name.to_string(), joined));
        self
    }

    /// Base64 text in one attribute.
    pub fn binary(mut self, name: &str, data: &[u8]) -> Self {
        self.element
            .attributes
            .push((name.to_string(), STANDARD.encode(data)));
        self
    }

    pub fn child<M: WireElement>(mut self, value: &M) -> Self {
        self.element.children.push(value.to_element());
        self
    }

    pub fn opt_child<M: WireElement>(self, value: Option<&M>) -> Self {
        match value {
            Some(value) => self.child(value),
            None => self,
        }
    }

    pub fn children<M: WireElement>(mut self, values: &[M]) -> Self {
        self.element
            .children
            .extend(values.iter().map(WireElement::to_element));
        self
    }

    pub fn build(self) -> Element {
        self.element
    }
}

/// Reads typed fields out of an element, reporting the offending field on failure.
#[derive(Debug, Clone, Copy)]
pub struct ElementReader<'a> {
    element: &'a Element,
}

impl<'a> ElementReader<'a> {
    /// Check the tag and start reading.
    pub fn expect(element: &'a Element, name: &str) -> Result<Self, DecodeError> {
        if element.name != name {
            return Err(DecodeError::UnexpectedElement {
                expected: name.to_string(),
                found: element.name.clone(),
            });
        }
        Ok(Self { element })
    }

    fn invalid(&self, attribute: &str, value: &str, reason: impl Into<String>) -> DecodeError {
        DecodeError::InvalidValue {
            element: self.element.name.clone(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn raw(&self, name: &str) -> Result<&'a str, DecodeError> {
        self.element
            .attr(name)
            .ok_or_else(|| DecodeError::MissingAttribute {
                element: self.element.name.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn required<T: WireValue>(&self, name: &str) -> Result<T, DecodeError> {
        let raw = self.raw(name)?;
        T::from_wire(raw).map_err(|reason| self.invalid(name, raw, reason))
    }

    pub fn optional<T: WireValue>(&self, name: &str) -> Result<Option<T>, DecodeError> {
        self.element
            .attr(name)
            .map(|raw| T::from_wire(raw).map_err(|reason| self.invalid(name, raw, reason)))
            .transpose()
    }

    pub fn flag(&self, name: &str, style: BoolStyle) -> Result<bool, DecodeError> {
        let raw = self.raw(name)?;
        style
            .decode(raw)
            .ok_or_else(|| self.invalid(name, raw, format!("not a {:?} boolean", style)))
    }

    pub fn opt_flag(&self, name: &str, style: BoolStyle) -> Result<Option<bool>, DecodeError> {
        match self.element.attr(name) {
            Some(_) => self.flag(name, style).map(Some),
            None => Ok(None),
        }
    }

    pub fn packed<T: WireValue>(&self, name: &str) -> Result<Vec<T>, DecodeError> {
        let raw = self.raw(name)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',')
            .enumerate()
            .map(|(index, item)| {
                T::from_wire(item)
                    .map_err(|reason| self.invalid(name, raw, format!("item {}: {}", index, reason)))
            })
            .collect()
    }

    pub fn binary(&self, name: &str) -> Result<Vec<u8>, DecodeError> {
        let raw = self.raw(name)?;
        STANDARD
            .decode(raw)
            .map_err(|e| self.invalid(name, raw, e.to_string()))
    }

    /// First child with the record's tag, if any.
    pub fn child<M: WireElement>(&self) -> Result<Option<M>, DecodeError> {
        self.element
            .children_named(M::TAG)
            .next()
            .map(M::from_element)
            .transpose()
    }

    pub fn required_child<M: WireElement>(&self) -> Result<M, DecodeError> {
        self.child()?.ok_or_else(|| DecodeError::MissingElement {
            element: self.element.name.clone(),
            child: M::TAG.to_string(),
        })
    }

    /// Every child with the record's tag, in document order.
    pub fn children<M: WireElement>(&self) -> Result<Vec<M>, DecodeError> {
        self.element
            .children_named(M::TAG)
            .map(M::from_element)
            .collect()
    }
}
