mod heap_page;

pub use heap_page::{
    HeapPage, HeapPageRef, SlotEntry, HEAP_HEADER_SIZE, MAX_TUPLE_SIZE, SLOT_SIZE,
};
