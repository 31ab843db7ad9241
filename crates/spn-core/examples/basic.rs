//! Demonstrates encrypting, tracing, and decrypting a block with the
//! tutorial SPN parameters.

use spn_core::{Cipher, CipherParams, PBox, SBox};

fn main() {
    let sbox = SBox::new(&[
        0xe, 0x4, 0xd, 0x1, 0x2, 0xf, 0xb, 0x8, 0x3, 0xa, 0x6, 0xc, 0x5, 0x9, 0x0, 0x7,
    ])
    .expect("valid s-box");
    let pbox = PBox::new(
        &[0x0, 0x4, 0x8, 0xc, 0x1, 0x5, 0x9, 0xd, 0x2, 0x6, 0xa, 0xe, 0x3, 0x7, 0xb, 0xf],
        16,
    )
    .expect("valid p-box");
    let keys = vec![
        vec![0x1, 0xa, 0x6, 0xd],
        vec![0x2, 0xa, 0xc, 0x2],
        vec![0x4, 0x5, 0x2, 0xf],
        vec![0x6, 0xf, 0xf, 0x1],
        vec![0xb, 0x5, 0x2, 0x0],
    ];
    let cipher = Cipher::new(CipherParams::spn(), sbox, Some(pbox), keys).expect("valid cipher");

    let plaintext = vec![0x1, 0x2, 0x3, 0x4];
    let trace = cipher.encrypt_traced(&plaintext).expect("matching arity");
    for (index, step) in trace.steps.iter().enumerate() {
        let hex: String = step.iter().map(|n| format!("{n:x}")).collect();
        println!("step {index:2}: 0x{hex}");
    }

    let decrypted = cipher.decrypt(&trace.output).expect("matching arity");
    assert_eq!(decrypted, plaintext);
    println!("example succeeded; decryption restored the plaintext");
}
