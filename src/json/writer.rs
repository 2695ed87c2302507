use serde_json::Number;

/// Streaming JSON writer driven by the converter.
///
/// Emission is token-by-token; implementations own separator and nesting
/// bookkeeping. `raw` splices a pre-rendered JSON fragment as the next
/// value, which is how speculatively-encoded extension values are appended.
pub trait JsonWriter {
    fn object_start(&mut self);
    fn object_end(&mut self);
    fn array_start(&mut self);
    fn array_end(&mut self);
    fn property_name(&mut self, name: &str);
    fn string(&mut self, value: &str);
    fn number(&mut self, value: &Number);
    fn bool(&mut self, value: bool);
    fn null(&mut self);
    fn raw(&mut self, json: &str);
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { first: bool },
    Array { first: bool },
}

/// A `JsonWriter` that appends canonical (compact) JSON text to a string
#[derive(Debug, Default)]
pub struct TextWriter {
    out: String,
    stack: Vec<Frame>,
}

impl TextWriter {
    pub fn new() -> Self {
        TextWriter::default()
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// Separator handling for the next value in the current container.
    /// Values inside objects follow a property name, which already placed
    /// the comma.
    fn begin_value(&mut self) {
        if let Some(Frame::Array { first }) = self.stack.last_mut() {
            if !*first {
                self.out.push(',');
            }
            *first = false;
        }
    }

    fn push_escaped(&mut self, s: &str) {
        // serde_json string serialization cannot fail for valid UTF-8
        self.out.push_str(&serde_json::to_string(s).unwrap());
    }
}

impl JsonWriter for TextWriter {
    fn object_start(&mut self) {
        self.begin_value();
        self.out.push('{');
        self.stack.push(Frame::Object { first: true });
    }

    fn object_end(&mut self) {
        self.stack.pop();
        self.out.push('}');
    }

    fn array_start(&mut self) {
        self.begin_value();
        self.out.push('[');
        self.stack.push(Frame::Array { first: true });
    }

    fn array_end(&mut self) {
        self.stack.pop();
        self.out.push(']');
    }

    fn property_name(&mut self, name: &str) {
        if let Some(Frame::Object { first }) = self.stack.last_mut() {
            if !*first {
                self.out.push(',');
            }
            *first = false;
        }
        self.push_escaped(name);
        self.out.push(':');
    }

    fn string(&mut self, value: &str) {
        self.begin_value();
        self.push_escaped(value);
    }

    fn number(&mut self, value: &Number) {
        self.begin_value();
        self.out.push_str(&value.to_string());
    }

    fn bool(&mut self, value: bool) {
        self.begin_value();
        self.out.push_str(if value { "true" } else { "false" });
    }

    fn null(&mut self) {
        self.begin_value();
        self.out.push_str("null");
    }

    fn raw(&mut self, json: &str) {
        self.begin_value();
        self.out.push_str(json);
    }
}
