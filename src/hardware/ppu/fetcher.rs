//! The mode-3 fetch engines: the background/window fetcher feeding the
//! background FIFO, and the sprite fetcher that interrupts it.

use crate::hardware::ppu::fifo::Pixel;
use crate::hardware::ppu::register_flags::{AttributeFlags, LcdControl};
use crate::hardware::ppu::{Ppu, SpriteEntry};

pub const TILE_MAP_9800: u16 = 0x9800;
pub const TILE_MAP_9C00: u16 = 0x9C00;
/// Unsigned tile data block (also the only one sprites can use).
pub const TILE_DATA_8000: u16 = 0x8000;
/// Signed tile data block base.
pub const TILE_DATA_9000: u16 = 0x9000;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FetcherState {
    GetTile,
    GetDataLow,
    GetDataHigh,
    Sleep,
    Push,
    /// First-tile variant: the fetched row is thrown away and the fetch
    /// restarts, priming the pipeline before any pixel leaves the FIFO.
    OptionalPush,
}

/// Background/window fetcher registers. While a sprite fetch is in flight
/// these are simply left untouched, which preserves the partial fetch the
/// same way the hardware latches it.
#[derive(Debug)]
pub struct Fetcher {
    pub state: FetcherState,
    /// First or second dot of the current two-dot state.
    dot: u8,
    /// Tile column counter, 0..32 within the active map row.
    tile_x: u8,
    tile_number: u8,
    attributes: AttributeFlags,
    data_low: u8,
    data_high: u8,
    first_tile: bool,
}

impl Default for Fetcher {
    fn default() -> Self {
        Fetcher {
            state: FetcherState::GetTile,
            dot: 0,
            tile_x: 0,
            tile_number: 0,
            attributes: AttributeFlags::empty(),
            data_low: 0,
            data_high: 0,
            first_tile: true,
        }
    }
}

impl Fetcher {
    /// Scanline start: everything back to square one, including the
    /// throwaway first fetch.
    pub fn start_scanline(&mut self) {
        *self = Fetcher::default();
    }

    /// Window trigger: restart from the left edge of the window map, but
    /// without a second throwaway fetch.
    pub fn start_window(&mut self) {
        *self = Fetcher {
            first_tile: false,
            ..Fetcher::default()
        };
    }

    fn advance(&mut self, next: FetcherState) {
        self.state = next;
        self.dot = 0;
    }
}

/// In-flight sprite fetch. Owning its own registers is what keeps the
/// background fetcher's state intact until it resumes.
#[derive(Debug)]
pub struct SpriteFetch {
    pub entry: SpriteEntry,
    state: FetcherState,
    dot: u8,
    tile_number: u8,
    data_low: u8,
}

impl SpriteFetch {
    pub fn new(entry: SpriteEntry) -> Self {
        SpriteFetch {
            entry,
            state: FetcherState::GetTile,
            dot: 0,
            tile_number: 0,
            data_low: 0,
        }
    }
}

impl Ppu {
    /// One dot of the background/window fetcher.
    pub(super) fn step_bg_fetcher(&mut self) {
        match self.fetcher.state {
            FetcherState::GetTile => {
                if self.fetcher.dot == 0 {
                    self.fetcher.dot = 1;
                } else {
                    let (tile, attributes) = self.fetch_tile_number();
                    self.fetcher.tile_number = tile;
                    self.fetcher.attributes = attributes;
                    self.fetcher.advance(FetcherState::GetDataLow);
                }
            }
            FetcherState::GetDataLow => {
                if self.fetcher.dot == 0 {
                    self.fetcher.dot = 1;
                } else {
                    self.fetcher.data_low = self.fetch_tile_data(0);
                    self.fetcher.advance(FetcherState::GetDataHigh);
                }
            }
            FetcherState::GetDataHigh => {
                if self.fetcher.dot == 0 {
                    self.fetcher.dot = 1;
                } else {
                    self.fetcher.data_high = self.fetch_tile_data(1);
                    let next = if self.fetcher.first_tile {
                        FetcherState::OptionalPush
                    } else {
                        FetcherState::Sleep
                    };
                    self.fetcher.advance(next);
                }
            }
            FetcherState::Sleep => {
                if self.fetcher.dot == 0 {
                    self.fetcher.dot = 1;
                } else {
                    // The first push attempt shares the sleep state's final
                    // dot; that keeps the steady state at 8 dots per tile.
                    self.fetcher.advance(FetcherState::Push);
                    self.try_push_bg_row();
                }
            }
            FetcherState::Push => {
                // Retries every dot until the FIFO has drained.
                self.try_push_bg_row();
            }
            FetcherState::OptionalPush => {
                // The primed row is discarded and the same tile is fetched
                // again; only happens for the first tile of a scanline.
                self.fetcher.first_tile = false;
                self.fetcher.advance(FetcherState::GetTile);
            }
        }
    }

    /// Tile number (and CGB attributes) for the fetcher's current column.
    fn fetch_tile_number(&self) -> (u8, AttributeFlags) {
        let (map_base, row, column) = if self.rendering_window {
            let base = if self.lcd_control.contains(LcdControl::WINDOW_MAP_SELECT) {
                TILE_MAP_9C00
            } else {
                TILE_MAP_9800
            };
            (base, self.window_line_counter, self.fetcher.tile_x)
        } else {
            let base = if self.lcd_control.contains(LcdControl::BG_TILE_MAP_SELECT) {
                TILE_MAP_9C00
            } else {
                TILE_MAP_9800
            };
            let row = self.current_y.wrapping_add(self.scroll_y);
            let column = (self.scroll_x / 8).wrapping_add(self.fetcher.tile_x) & 0x1F;
            (base, row, column)
        };

        let offset = (row as u16 / 8) * 32 + column as u16;
        let address = (map_base - TILE_DATA_8000 + offset) as usize;
        let attributes = if self.cgb {
            AttributeFlags::from_bits_truncate(self.vram[0x2000 + address])
        } else {
            AttributeFlags::empty()
        };

        (self.vram[address], attributes)
    }

    /// One byte of the current tile row, `plane` 0 = low bits, 1 = high.
    fn fetch_tile_data(&self, plane: u16) -> u8 {
        let row = if self.rendering_window {
            self.window_line_counter
        } else {
            self.current_y.wrapping_add(self.scroll_y)
        };
        let mut line = (row & 7) as u16;
        if self.fetcher.attributes.contains(AttributeFlags::Y_FLIP) {
            line = 7 - line;
        }

        let tile = self.fetcher.tile_number;
        let address = if self.lcd_control.contains(LcdControl::BG_WINDOW_TILE_SELECT) {
            TILE_DATA_8000 + tile as u16 * 16
        } else {
            TILE_DATA_9000.wrapping_add((tile as i8 as i16 * 16) as u16)
        } + line * 2
            + plane;

        let bank = self
            .fetcher
            .attributes
            .contains(AttributeFlags::TILE_VRAM_BANK) as usize;
        self.vram[bank * 0x2000 + (address - TILE_DATA_8000) as usize]
    }

    /// Push only succeeds into an empty FIFO.
    fn try_push_bg_row(&mut self) {
        if self.bg_fifo.is_empty() {
            self.push_bg_row();
            self.fetcher.tile_x = (self.fetcher.tile_x + 1) & 0x1F;
            self.fetcher.advance(FetcherState::GetTile);
        }
    }

    /// Decode the latched tile row into eight background pixels.
    fn push_bg_row(&mut self) {
        let attributes = self.fetcher.attributes;
        let low = self.fetcher.data_low;
        let high = self.fetcher.data_high;

        for i in 0..8 {
            let bit = if attributes.contains(AttributeFlags::X_FLIP) {
                i
            } else {
                7 - i
            };
            self.bg_fifo.push(Pixel {
                color_id: ((high >> bit) & 1) << 1 | ((low >> bit) & 1),
                palette: attributes.cgb_palette_number(),
                priority: attributes.contains(AttributeFlags::OBJ_TO_BG_PRIORITY),
                oam_index: 0,
            });
        }
    }

    /// One dot of the sprite fetcher; returns `true` when it is done and
    /// the background fetcher may resume.
    pub(super) fn step_sprite_fetcher(&mut self) -> bool {
        let mut fetch = match self.sprite_fetch.take() {
            Some(fetch) => fetch,
            None => return true,
        };

        let mut finished = false;
        match fetch.state {
            FetcherState::GetTile => {
                if fetch.dot == 0 {
                    fetch.dot = 1;
                } else {
                    fetch.tile_number = self.sprite_tile_number(&fetch.entry);
                    fetch.state = FetcherState::GetDataLow;
                    fetch.dot = 0;
                }
            }
            FetcherState::GetDataLow => {
                if fetch.dot == 0 {
                    fetch.dot = 1;
                } else {
                    fetch.data_low = self.sprite_tile_data(&fetch.entry, fetch.tile_number, 0);
                    fetch.state = FetcherState::GetDataHigh;
                    fetch.dot = 0;
                }
            }
            _ => {
                if fetch.dot == 0 {
                    fetch.dot = 1;
                } else {
                    let high = self.sprite_tile_data(&fetch.entry, fetch.tile_number, 1);
                    self.merge_sprite_row(&fetch.entry, fetch.data_low, high);
                    finished = true;
                }
            }
        }

        if !finished {
            self.sprite_fetch = Some(fetch);
        }
        finished
    }

    fn sprite_row(&self, entry: &SpriteEntry) -> u8 {
        let height = if self.lcd_control.contains(LcdControl::SPRITE_SIZE) {
            16
        } else {
            8
        };
        let mut row = self.current_y.wrapping_add(16).wrapping_sub(entry.y) % height;
        if entry.attributes.contains(AttributeFlags::Y_FLIP) {
            row = height - 1 - row;
        }
        row
    }

    fn sprite_tile_number(&self, entry: &SpriteEntry) -> u8 {
        if self.lcd_control.contains(LcdControl::SPRITE_SIZE) {
            // 8x16: bit 0 is ignored, the row picks the half.
            let base = entry.tile & 0xFE;
            if self.sprite_row(entry) >= 8 {
                base | 0x1
            } else {
                base
            }
        } else {
            entry.tile
        }
    }

    fn sprite_tile_data(&self, entry: &SpriteEntry, tile: u8, plane: u16) -> u8 {
        let line = (self.sprite_row(entry) & 7) as u16;
        let bank = self.cgb && entry.attributes.contains(AttributeFlags::TILE_VRAM_BANK);
        let address = tile as u16 * 16 + line * 2 + plane;
        self.vram[(bank as usize) * 0x2000 + address as usize]
    }

    fn merge_sprite_row(&mut self, entry: &SpriteEntry, low: u8, high: u8) {
        let mut row = [Pixel::default(); 8];
        for (i, pixel) in row.iter_mut().enumerate() {
            let bit = if entry.attributes.contains(AttributeFlags::X_FLIP) {
                i
            } else {
                7 - i
            };
            *pixel = Pixel {
                color_id: ((high >> bit) & 1) << 1 | ((low >> bit) & 1),
                palette: if self.cgb {
                    entry.attributes.cgb_palette_number()
                } else {
                    entry.attributes.contains(AttributeFlags::PALETTE_NUMBER) as u8
                },
                priority: entry
                    .attributes
                    .contains(AttributeFlags::OBJ_TO_BG_PRIORITY),
                oam_index: entry.oam_index,
            };
        }

        // Sprites hanging off the left edge only contribute their visible
        // tail; slot 0 always lines up with the next pixel to leave.
        let skip = 8usize.saturating_sub(entry.x as usize);
        let oam_priority = self.cgb && self.object_priority & 0x1 == 0;
        self.sprite_fifo.merge_sprite(&row[skip..], oam_priority);
    }
}
