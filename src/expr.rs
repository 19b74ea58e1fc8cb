//! Symbolic results over the expression link
//!
//! Text and arrays of text never travel through the binary slot. They are
//! sent as `EvaluatePacket[CompoundExpression[Set[linkreturn, payload], Null]]`
//! and the host picks `linkreturn` up after the call returns.

use tracing::trace;

use crate::array::{element_count, NdArray};
use crate::error::LinkError;

/// Token sink of the host's expression protocol
pub trait ExprLink {
    /// Start a compound expression with `argc` arguments following
    fn put_function(&self, head: &str, argc: usize) -> Result<(), LinkError>;
    fn put_symbol(&self, name: &str) -> Result<(), LinkError>;
    fn put_string(&self, value: &str) -> Result<(), LinkError>;
    /// Finish and flush the current packet
    fn end_packet(&self) -> Result<(), LinkError>;
}

/// Values that serialize as a payload expression
pub trait Expression {
    fn put<L: ExprLink + ?Sized>(&self, link: &L) -> Result<(), LinkError>;
}

impl Expression for str {
    fn put<L: ExprLink + ?Sized>(&self, link: &L) -> Result<(), LinkError> {
        link.put_string(self)
    }
}

impl Expression for String {
    fn put<L: ExprLink + ?Sized>(&self, link: &L) -> Result<(), LinkError> {
        link.put_string(self)
    }
}

impl<const R: usize> Expression for NdArray<String, R> {
    fn put<L: ExprLink + ?Sized>(&self, link: &L) -> Result<(), LinkError> {
        put_nested(link, self.dims(), self.as_slice())
    }
}

/// Shape-tagged payload: nested `List` heads, one level per axis
fn put_nested<L: ExprLink + ?Sized>(
    link: &L,
    dims: &[usize],
    data: &[String],
) -> Result<(), LinkError> {
    match dims.split_first() {
        None => {
            let leaf = data
                .first()
                .ok_or_else(|| LinkError::new("array payload shorter than its shape"))?;
            link.put_string(leaf)
        }
        Some((&extent, rest)) => {
            link.put_function("List", extent)?;
            let stride = element_count(rest)
                .ok_or_else(|| LinkError::new("array payload shape overflows"))?;
            for i in 0..extent {
                let chunk = data
                    .get(i * stride..(i + 1) * stride)
                    .ok_or_else(|| LinkError::new("array payload shorter than its shape"))?;
                put_nested(link, rest, chunk)?;
            }
            Ok(())
        }
    }
}

/// Transmit `linkreturn = payload` as one evaluation packet
pub fn send_assignment<L, E>(link: &L, payload: &E) -> Result<(), LinkError>
where
    L: ExprLink + ?Sized,
    E: Expression + ?Sized,
{
    trace!(target: "wlbridge::expr", "sending symbolic result");
    link.put_function("EvaluatePacket", 1)?;
    link.put_function("CompoundExpression", 2)?;
    link.put_function("Set", 2)?;
    link.put_symbol("linkreturn")?;
    payload.put(link)?;
    link.put_symbol("Null")?;
    link.end_packet()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Host, LinkToken, MemoryHost};

    fn func(head: &str, argc: usize) -> LinkToken {
        LinkToken::Function { head: head.to_string(), argc }
    }

    #[test]
    fn text_assignment_sequence() {
        let host = MemoryHost::new();
        send_assignment(host.link(), "hello").unwrap();

        assert_eq!(
            host.link().tokens(),
            vec![
                func("EvaluatePacket", 1),
                func("CompoundExpression", 2),
                func("Set", 2),
                LinkToken::Symbol("linkreturn".into()),
                LinkToken::String("hello".into()),
                LinkToken::Symbol("Null".into()),
                LinkToken::EndPacket,
            ]
        );
    }

    #[test]
    fn string_matrix_nests_lists_row_major() {
        let host = MemoryHost::new();
        let words: Vec<String> = ["a", "b", "c", "d", "e", "f"].iter().map(|s| s.to_string()).collect();
        let array = NdArray::from_vec([2, 3], words).unwrap();
        array.put(host.link()).unwrap();

        let tokens = host.link().tokens();
        assert_eq!(tokens[0], func("List", 2));
        assert_eq!(tokens[1], func("List", 3));
        assert_eq!(tokens[2], LinkToken::String("a".into()));
        assert_eq!(tokens[5], func("List", 3));
        assert_eq!(tokens[8], LinkToken::String("f".into()));
        assert_eq!(tokens.len(), 9);
    }

    #[test]
    fn zero_extent_inner_axis_emits_empty_lists() {
        let host = MemoryHost::new();
        let array = NdArray::<String, 2>::from_vec([2, 0], Vec::new()).unwrap();
        array.put(host.link()).unwrap();
        assert_eq!(host.link().tokens(), vec![func("List", 2), func("List", 0), func("List", 0)]);
    }
}
