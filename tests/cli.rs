use std::{io::Write, process::Command};
use tempfile::NamedTempFile;

fn runelf() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_runelf"));
    cmd.env_remove("RUNELF_LOG").env("NO_COLOR", "1");
    cmd
}

fn write_image(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write image");
    file.flush().expect("flush image");
    file
}

/// Single-segment ELF32 executable whose entry point is the start of `code`.
fn executable(code: &[u8]) -> Vec<u8> {
    const VADDR: u32 = 0x0804_8000;
    const CODE_OFFSET: u32 = 0x60;

    let mut elf = vec![0u8; CODE_OFFSET as usize];
    elf[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
    elf[4] = 1; // 32-bit
    elf[5] = 1; // little-endian
    elf[6] = 1; // version

    put_u16(&mut elf, 0x10, 2); // ET_EXEC
    put_u16(&mut elf, 0x12, 3); // EM_386
    put_u32(&mut elf, 0x14, 1); // version
    put_u32(&mut elf, 0x18, VADDR + CODE_OFFSET);
    put_u32(&mut elf, 0x1C, 52);
    put_u16(&mut elf, 0x28, 52);
    put_u16(&mut elf, 0x2A, 32);
    put_u16(&mut elf, 0x2C, 1);

    let code_len = code.len() as u32;
    let phdr = [1, 0, VADDR, VADDR, CODE_OFFSET + code_len, 0x1000, 0b101, 0x1000];
    for (i, word) in phdr.into_iter().enumerate() {
        put_u32(&mut elf, 52 + i * 4, word);
    }

    elf.extend_from_slice(code);
    elf
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[test]
fn missing_argument_prints_usage() {
    let output = runelf().output().expect("run");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage:"));
    assert!(output.stdout.is_empty());
}

#[test]
fn extra_arguments_print_usage() {
    let output = runelf().args(["a", "b"]).output().expect("run");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("<ELF Executable>"));
}

#[test]
fn unreadable_file_fails_to_load() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = runelf()
        .arg(dir.path().join("missing"))
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot open"));
    assert!(output.stdout.is_empty());
}

#[test]
fn non_elf_file_fails_to_load() {
    let image = write_image(b"#!/bin/sh\n# a shell script is long enough to hold an ELF header\nexit 0\n");
    let output = runelf().arg(image.path()).output().expect("run");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not an ELF file"));
    assert!(output.stdout.is_empty());
}

#[test]
fn invalid_log_level_is_rejected() {
    let image = write_image(&executable(&[0xC3]));
    let output = runelf()
        .env("RUNELF_LOG", "chatty")
        .arg(image.path())
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("RUNELF_LOG"));
}

#[cfg(all(unix, any(target_arch = "x86", target_arch = "x86_64")))]
#[test]
fn reports_value_returned_by_entry_point() {
    // mov eax, 42; ret
    let image = write_image(&executable(&[0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3]));
    let output = runelf().arg(image.path()).output().expect("run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "User _start return value = 42\n"
    );
}

#[cfg(all(unix, any(target_arch = "x86", target_arch = "x86_64")))]
#[test]
fn negative_return_value_still_exits_successfully() {
    // mov eax, -7; ret
    let image = write_image(&executable(&[0xB8, 0xF9, 0xFF, 0xFF, 0xFF, 0xC3]));
    let output = runelf()
        .env("RUNELF_LOG", "info")
        .arg(image.path())
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "User _start return value = -7\n"
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("Entry point"));
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
#[test]
fn unwritable_stdout_is_reported() {
    let image = write_image(&executable(&[0xB8, 0x2A, 0x00, 0x00, 0x00, 0xC3]));
    // Every write to /dev/full fails with ENOSPC.
    let full = std::fs::OpenOptions::new()
        .write(true)
        .open("/dev/full")
        .expect("open /dev/full");
    let output = runelf()
        .arg(image.path())
        .stdout(full)
        .output()
        .expect("run");

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot write result"));
}
