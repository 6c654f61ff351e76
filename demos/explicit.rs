use std::{io::Read, ptr};

use libc::sbrk;
use fralloc::{ExplicitAllocator, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations change the
/// program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  unsafe {
    print_program_break("start");

    // Init reserves the region fences plus one 4 KiB chunk from sbrk.
    let mut allocator = ExplicitAllocator::new(Sbrk).expect("sbrk failed");

    print_program_break("after init");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate 8 bytes for a u64.
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(8).expect("allocation failed");
    println!("\n[1] Allocate 8 bytes, address = {first_block:?}");

    // Write something into the allocated memory to show it's usable.
    let first_ptr = first_block as *mut u64;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes and initialize them.
    //    This shows how the allocator handles "odd-sized" allocations:
    //    the returned address is still 8-byte aligned.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12).expect("allocation failed");
    println!("\n[2] Allocate 12 bytes, address = {second_block:?}");
    println!(
      "[2] Address % 8 = {} (always 0)",
      second_block as usize % 8
    );

    ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the first block, then allocate the same size again.
    //    The free list is LIFO, so the freshly freed block is reused
    //    and the same address comes back.
    // --------------------------------------------------------------------
    allocator.deallocate(first_block);
    println!("\n[3] Deallocated first_block at {first_block:?}");

    let third_block = allocator.allocate(8).expect("allocation failed");
    println!(
      "[3] third_block == first_block? {}",
      if third_block == first_block {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Grow an allocation with reallocate.
    //    The payload moves to a new block, the old bytes come along.
    // --------------------------------------------------------------------
    let grown = allocator
      .reallocate(second_block, 256)
      .expect("reallocation failed");
    println!("\n[4] Reallocated 12 -> 256 bytes, address = {grown:?}");
    println!(
      "[4] First byte after the move = 0x{:X} (still 0xAB)",
      grown.read()
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate a large block to observe heap growth.
    //    Anything above the remaining free space triggers a grow(), which
    //    moves the program break.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let big_block = allocator.allocate(64 * 1024).expect("allocation failed");
    println!("\n[5] Allocate large 64 KiB block, address = {big_block:?}");

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) End of demo.
    //
    //    The managed region never shrinks; freed blocks are recycled
    //    through the free list. The OS reclaims everything on exit.
    // --------------------------------------------------------------------
    allocator.deallocate(grown);
    allocator.deallocate(big_block);
    println!("\n[6] End of example. Process will exit and the OS will reclaim all memory.");
  }
}
