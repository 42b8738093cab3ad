//! CPU bitmaps as printed by the kernel under `/sys/devices/system/cpu`.
//!
//! Two textual forms exist: the hex mask (`ff,00000001`, least significant
//! nibble last) and the range list (`0-3,8,10-16:2`). Both parse into a
//! [`CpuSet`] with a fixed capacity; CPUs beyond the capacity are dropped.

use std::fmt;

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-capacity set of CPU numbers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuSet {
    words: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseCpuSetError;

impl CpuSet {
    /// Allocates an empty set able to hold CPUs `0..max_cpus`, rounded up to
    /// whole words. Returns `None` if the allocation cannot be satisfied.
    pub fn try_new(max_cpus: usize) -> Option<Self> {
        let nwords = max_cpus.div_ceil(WORD_BITS).max(1);
        let mut words = Vec::new();
        words.try_reserve_exact(nwords).ok()?;
        words.resize(nwords, 0);
        Some(Self { words })
    }

    /// Number of CPU bits the set can hold.
    pub fn capacity(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    /// Sets `cpu`; out-of-range CPUs are ignored.
    pub fn set(&mut self, cpu: usize) {
        if let Some(word) = self.words.get_mut(cpu / WORD_BITS) {
            *word |= 1 << (cpu % WORD_BITS);
        }
    }

    pub fn clear(&mut self, cpu: usize) {
        if let Some(word) = self.words.get_mut(cpu / WORD_BITS) {
            *word &= !(1 << (cpu % WORD_BITS));
        }
    }

    pub fn is_set(&self, cpu: usize) -> bool {
        self.words
            .get(cpu / WORD_BITS)
            .is_some_and(|word| word & (1 << (cpu % WORD_BITS)) != 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    fn zero(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Iterates set CPUs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter(move |cpu| self.is_set(*cpu))
    }

    /// Replaces the contents with a hex mask such as `00000000,0000000f`.
    pub fn parse_mask(&mut self, text: &str) -> Result<(), ParseCpuSetError> {
        self.zero();
        let digits = text.strip_prefix("0x").unwrap_or(text);
        let mut cpu = 0usize;
        for ch in digits.bytes().rev() {
            if ch == b',' {
                continue;
            }
            let val = (ch as char).to_digit(16).ok_or(ParseCpuSetError)? as usize;
            for bit in 0..4 {
                if val & (1 << bit) != 0 {
                    self.set(cpu + bit);
                }
            }
            cpu += 4;
        }
        Ok(())
    }

    /// Replaces the contents with a range list such as `0-3,8,10-16:2`.
    pub fn parse_list(&mut self, text: &str) -> Result<(), ParseCpuSetError> {
        self.zero();
        if text.trim().is_empty() {
            return Ok(());
        }
        for token in text.split(',') {
            let (range, stride) = match token.split_once(':') {
                Some((range, stride)) => (range, parse_number(stride)?),
                None => (token, 1),
            };
            if stride == 0 {
                return Err(ParseCpuSetError);
            }
            let (first, last) = match range.split_once('-') {
                Some((a, b)) => (parse_number(a)?, parse_number(b)?),
                None => {
                    let a = parse_number(range)?;
                    (a, a)
                }
            };
            if first > last {
                return Err(ParseCpuSetError);
            }
            let capacity = self.capacity();
            let mut cpu = first;
            while cpu <= last && cpu < capacity {
                self.set(cpu);
                cpu = match cpu.checked_add(stride) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
        Ok(())
    }
}

fn parse_number(text: &str) -> Result<usize, ParseCpuSetError> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseCpuSetError);
    }
    text.parse().map_err(|_| ParseCpuSetError)
}

impl fmt::Display for CpuSet {
    /// Renders the list form, e.g. `0-3,8`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut cpus = self.iter().peekable();
        while let Some(start) = cpus.next() {
            let mut end = start;
            while cpus.peek() == Some(&(end + 1)) {
                end += 1;
                cpus.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}
