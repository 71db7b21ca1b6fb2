//! Static memory allocation for program variables.
//!
//! Cell 0 and cell 1 are permanently reserved (the `WRITE`-of-a-literal
//! scratch convention, see the code generator's `write` emitter). Cells
//! `2 ..= K+1` are reserved for iterator slots when the program contains
//! any counted loop; user storage begins at `K+2` (or `2` when there are
//! no counted loops at all, i.e. `K == 0`).
//!
//! Arrays over 1000 elements take a fast path: they are carved off the
//! high-water mark and never enter the per-cell occupied set, so an
//! allocation of a million-element array costs O(1) rather than O(n).

use std::collections::BTreeSet;

const FIRST_RESERVED_CELLS: i64 = 2;

pub struct MemoryAllocator {
    first_user_cell: i64,
    occupied: BTreeSet<i64>,
    big_ranges: Vec<(i64, i64)>,
    high_water: i64,
    iterator_region: (i64, i64),
}

impl MemoryAllocator {
    /// `iterator_capacity` is `K` from §3: `2 * (1 + maxDepth)` when the
    /// program has any counted loop, `0` otherwise.
    pub fn new(iterator_capacity: i64) -> Self {
        let first_user_cell = FIRST_RESERVED_CELLS + iterator_capacity;
        MemoryAllocator {
            first_user_cell,
            occupied: BTreeSet::new(),
            big_ranges: Vec::new(),
            high_water: first_user_cell,
            iterator_region: (FIRST_RESERVED_CELLS, FIRST_RESERVED_CELLS + iterator_capacity),
        }
    }

    fn in_big_range(&self, cell: i64) -> bool {
        self.big_ranges.iter().any(|(lo, hi)| cell >= *lo && cell < *hi)
    }

    /// Allocates `n` contiguous cells for a scalar or (non-big) array,
    /// returning the base address.
    pub fn allocate(&mut self, n: i64) -> i64 {
        if n > 1000 {
            let base = self.high_water;
            self.big_ranges.push((base, base + n));
            self.high_water = base + n;
            log::trace!("allocator: big array base={base} len={n}");
            return base;
        }

        let mut candidate = self.first_user_cell;
        'search: loop {
            for offset in 0..n {
                let cell = candidate + offset;
                if self.occupied.contains(&cell) || self.in_big_range(cell) {
                    candidate = cell + 1;
                    continue 'search;
                }
            }
            break;
        }

        for offset in 0..n {
            self.occupied.insert(candidate + offset);
        }
        self.high_water = self.high_water.max(candidate + n);
        log::trace!("allocator: base={candidate} len={n}");
        candidate
    }

    /// Releases `n` cells starting at `base`. Freeing a cell that was not
    /// occupied is non-fatal: the caller is told via the returned `bool`
    /// (`true` when every cell was actually occupied) but compilation
    /// proceeds either way.
    pub fn deallocate(&mut self, base: i64, n: i64) -> bool {
        let mut all_occupied = true;
        for offset in 0..n {
            if !self.occupied.remove(&(base + offset)) {
                all_occupied = false;
            }
        }
        all_occupied
    }

    /// Finds a free cell inside the iterator region (cells `2 ..= K+1`).
    pub fn allocate_iterator(&mut self) -> i64 {
        let (lo, hi) = self.iterator_region;
        for cell in lo..hi {
            if !self.occupied.contains(&cell) {
                self.occupied.insert(cell);
                log::trace!("allocator: iterator cell={cell}");
                return cell;
            }
        }
        unreachable!(
            "iterator region ({lo}..{hi}) exhausted; preprocessor under-sized it for the actual nesting depth"
        );
    }

    pub fn deallocate_iterator(&mut self, addr: i64) -> bool {
        self.occupied.remove(&addr)
    }
}
