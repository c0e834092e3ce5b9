//! Single-threaded data structure utilities.

mod ring_buffer;
mod skip_list;
mod take_cell;

pub(crate) use self::{
    ring_buffer::RingBuffer,
    skip_list::SkipList,
    take_cell::TakeCell,
};
