//! pprof proto3 export (spec.md section 6.3), grounded on
//! `examples/original_source/lib/pprof.c`'s hand-rolled varint/tag encoder
//! -- no generated-code protobuf crate, matching the original's own choice
//! to write the wire format by hand rather than link `protoc` output.
//!
//! Field layout mirrors the standard `perftools.profiles.Profile` message:
//! `sample_type`(1), `sample`(2), `location`(4), `function`(5),
//! `string_table`(6). String id `0` is always the empty string (every
//! proto3 string field defaults to it when "unset").
//!
//! Each `sample` record corresponds to one distinct full call stack that
//! `ProfileThread` ever had live (`Profile::stacks`, grounded on the
//! original's `FbleProfile` call-stack structures, see `lib.rs`), not to a
//! single adjacent `(caller, callee)` edge: a four-deep chain
//! `module -> f -> g -> h` is one `sample` record with four location ids,
//! leaf (`h`) first, matching spec.md section 6.3's documented order. The
//! record's two values are that exact stack's own `calls` and `samples`
//! counters (how many times it was live at a call versus at a statistical
//! sample).

use crate::Profile;

fn varint(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            buf.push(byte | 0x80);
        } else {
            buf.push(byte);
            break;
        }
    }
}

fn tag(buf: &mut Vec<u8>, field: u32, wire_type: u32) {
    varint(buf, ((field as u64) << 3) | wire_type as u64);
}

fn varint_field(buf: &mut Vec<u8>, field: u32, v: u64) {
    tag(buf, field, 0);
    varint(buf, v);
}

fn bytes_field(buf: &mut Vec<u8>, field: u32, data: &[u8]) {
    tag(buf, field, 2);
    varint(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn value_type(type_id: i64, unit_id: i64) -> Vec<u8> {
    let mut m = Vec::new();
    varint_field(&mut m, 1, type_id as u64);
    varint_field(&mut m, 2, unit_id as u64);
    m
}

fn line(function_id: u64, line_no: i64) -> Vec<u8> {
    let mut m = Vec::new();
    varint_field(&mut m, 1, function_id);
    varint_field(&mut m, 2, line_no as u64);
    m
}

fn location(id: u64, function_id: u64, line_no: i64) -> Vec<u8> {
    let mut m = Vec::new();
    varint_field(&mut m, 1, id);
    let ln = line(function_id, line_no);
    bytes_field(&mut m, 4, &ln);
    m
}

fn function(id: u64, name_id: i64, file_id: i64, line_no: i64) -> Vec<u8> {
    let mut m = Vec::new();
    varint_field(&mut m, 1, id);
    varint_field(&mut m, 2, name_id as u64);
    varint_field(&mut m, 4, file_id as u64);
    varint_field(&mut m, 5, line_no as u64);
    m
}

fn sample(location_ids: &[u64], values: &[i64]) -> Vec<u8> {
    let mut m = Vec::new();
    for &id in location_ids {
        varint_field(&mut m, 1, id);
    }
    for &v in values {
        tag(&mut m, 2, 0);
        varint(&mut m, v as u64);
    }
    m
}

/// Encode `profile` as a `Profile` message.
///
/// String table layout: `0`="" (proto3 default), `1`="calls", `2`="count",
/// `3`="samples", `4`="count", then per block `i` (in table order) the
/// block's own name at `2*i+5` and its source file at `2*i+6`.
pub(crate) fn encode(profile: &Profile) -> Vec<u8> {
    let blocks = profile.blocks.borrow();
    let mut out = Vec::new();

    let calls_type = value_type(1, 2);
    let samples_type = value_type(3, 4);
    bytes_field(&mut out, 1, &calls_type);
    bytes_field(&mut out, 1, &samples_type);

    for (i, block) in blocks.iter().enumerate() {
        let func_id = i as u64 + 1;
        let name_id = (2 * i + 5) as i64;
        let file_id = (2 * i + 6) as i64;
        let loc = location(func_id, func_id, block.name.loc.line as i64);
        let func = function(func_id, name_id, file_id, block.name.loc.line as i64);
        bytes_field(&mut out, 4, &loc);
        bytes_field(&mut out, 5, &func);
    }

    for (stack, counts) in profile.stacks().iter() {
        // Leaf first, root last -- see the module doc comment on location
        // ordering.
        let location_ids: Vec<u64> = stack.iter().rev().map(|&block_id| block_id as u64 + 1).collect();
        let s = sample(&location_ids, &[counts.calls as i64, counts.samples as i64]);
        bytes_field(&mut out, 2, &s);
    }

    let mut strings: Vec<String> = vec![String::new(), "calls".into(), "count".into(), "samples".into(), "count".into()];
    for block in blocks.iter() {
        strings.push(block.name.to_string());
        strings.push(block.name.loc.source.to_string());
    }
    for s in &strings {
        bytes_field(&mut out, 6, s.as_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fble_common::{Loc, Name, NameSpace};
    use std::rc::Rc;

    #[test]
    fn encodes_without_panicking_and_starts_with_sample_type_fields() {
        let profile = Profile::new(
            true,
            vec![Name::new("<root>", NameSpace::Normal, Loc::new(Rc::from("t.fble"), 1, 1))],
        );
        let bytes = profile.to_pprof();
        assert!(!bytes.is_empty());
        // field 1, wire type 2 => tag byte 0x0a
        assert_eq!(bytes[0], 0x0a);
    }

    #[test]
    fn one_sample_record_per_distinct_call_stack() {
        let profile = Profile::new(
            true,
            vec![
                Name::new("<root>", NameSpace::Normal, Loc::new(Rc::from("t.fble"), 1, 1)),
                Name::new("A", NameSpace::Normal, Loc::new(Rc::from("t.fble"), 2, 1)),
                Name::new("B", NameSpace::Normal, Loc::new(Rc::from("t.fble"), 3, 1)),
            ],
        );
        {
            let mut thread = profile.new_thread().unwrap();
            thread.enter_block(1);
            thread.enter_block(2);
            thread.exit_block();
            thread.exit_block();
        }
        let bytes = profile.to_pprof();
        // Two distinct stacks were ever live (root->A, root->A->B); each
        // becomes one sample(field 2) record, each prefixed by tag byte
        // 0x12 (field 2, wire type 2).
        let sample_tags = bytes.iter().filter(|&&b| b == 0x12).count();
        assert_eq!(sample_tags, 2);
    }

    #[test]
    fn a_four_deep_chain_keeps_one_sample_per_stack_depth() {
        let profile = Profile::new(
            true,
            (0..4u32)
                .map(|i| Name::new(format!("b{i}"), NameSpace::Normal, Loc::new(Rc::from("t.fble"), i + 1, 1)))
                .collect(),
        );
        {
            let mut thread = profile.new_thread().unwrap();
            thread.enter_block(1); // stack [0, 1]
            thread.enter_block(2); // stack [0, 1, 2]
            thread.enter_block(3); // stack [0, 1, 2, 3]
        }
        // Each push grows the live stack by one frame without revisiting an
        // earlier one, so three distinct stacks were ever live -- never
        // collapsed down to one sample per adjacent edge.
        let stacks = profile.stacks();
        assert_eq!(stacks.len(), 3);
        let deepest = &stacks.last().unwrap().0;
        assert_eq!(deepest, &vec![0, 1, 2, 3]);
        drop(stacks);

        let bytes = profile.to_pprof();
        assert_eq!(bytes.iter().filter(|&&b| b == 0x12).count(), 3);
    }
}
