// fixed order bit set, index i is node/endpoint i
#[derive(Clone,Debug,PartialEq,Eq,Default)]
pub(crate) struct BitSet {
    size:usize,
    ones:usize,
    bytes:Vec<u8>
}

impl BitSet {
    pub(crate) fn new() -> Self {
        Self {size:0,ones:0,bytes:vec![]}
    }
    pub(crate) fn with_len(len:usize,bit:bool) -> Self {
        if len == 0 {return Self::new()}
        let mut bytes = vec![if bit {u8::MAX} else {0};len.div_ceil(8)];
        // keep the padding bits of the last byte cleared
        let tail = len % 8;
        if bit && tail != 0 {
            if let Some(last) = bytes.last_mut() {
                *last = (1u8 << tail) - 1;
            }
        }
        Self {size:len,ones:if bit {len} else {0},bytes}
    }
    pub(crate) fn count_ones(&self) -> usize {
        self.ones
    }
    pub(crate) fn push_bit(&mut self, bit:bool) {
        let byte_pos = self.size / 8;
        let pos_in_byte = self.size % 8;

        debug_assert!(byte_pos <= self.bytes.len());

        if byte_pos == self.bytes.len() {
            self.bytes.push(0);
        }
        let mask = 1u8 << pos_in_byte;
        if bit {
            self.bytes[byte_pos] |= mask;
            self.ones += 1;
        }else{
            self.bytes[byte_pos] &= !mask;
        }
        self.size += 1;
    }
    pub(crate) fn get_at(&self,index:usize) -> Option<bool> {
        if index >= self.size {return None}
        let byte = self.bytes.get(index / 8)?;
        let mask = 1u8 << (index % 8);
        Some(*byte & mask > 0)
    }
    // out of range reads count as unset
    pub(crate) fn contains(&self,index:usize) -> bool {
        self.get_at(index).unwrap_or(false)
    }
    pub(crate) fn store_at(&mut self,index:usize,bit:bool) -> Option<()> {
        if index >= self.size {return None}
        let byte = self.bytes.get_mut(index / 8)?;
        let mask = 1u8 << (index % 8);
        let was_set = *byte & mask > 0;
        if bit {
            *byte |= mask;
        }else{
            *byte &= !mask;
        }
        match (was_set,bit) {
            (false,true) => self.ones += 1,
            (true,false) => self.ones -= 1,
            _ => {}
        }
        Some(())
    }
    pub(crate) fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(|i| self.contains(*i))
    }
}

impl FromIterator<bool> for BitSet {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let mut set = Self::new();
        for bit in iter {
            set.push_bit(bit);
        }
        set
    }
}
