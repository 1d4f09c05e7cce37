use crate::bios::{Bios, TEXT_80X25};
use crate::devices::{Vga, Video};
use crate::memory::Bus;
use crate::Configuration;
use std::rc::Rc;

// Real-mode memory map of the machine we assemble:
//
//   $00000-$003FF   Interrupt vector table (256 x offset:segment)
//   $00400-$004FF   BIOS data area (unused by this BIOS, free RAM)
//   $00500-$07BFF   Free conventional memory
//   $07C00-$07DFF   Boot sector load address
//   $07E00-$9FFFF   Free conventional memory (640 KB less the above)
//   $A0000-$BFFFF   VGA window, owned by the Vga device
//                   $A0000  planar/linear graphics modes
//                   $B8000  colour text pages and CGA graphics
//   $C0000-$FFFFF   Adapter/BIOS ROM shadow area, plain RAM here
//
// The BIOS itself lives host-side and claims no memory; its sole
// guest-visible state is the interrupt surface plus the video state
// shared with the Vga device.

/// An IBM PC with a VGA adapter and one 1.44 MB diskette holding
/// `disk`. The first sector of that image is what `boot` loads.
pub fn ibm_pc(disk: Vec<u8>) -> Configuration {
    let video = Video::new(TEXT_80X25);
    let mut bus = Bus::new();
    bus.attach(Vga::new(Rc::clone(&video))).expect("empty bus cannot conflict");
    bus.attach(Bios::new(Rc::clone(&video), disk)).expect("empty bus cannot conflict");

    Configuration {
        ignore_magic: false,
        silent: false,
        sync: false,
        clocks_per_tick: 10_000,
        bus,
        video,
    }
}
