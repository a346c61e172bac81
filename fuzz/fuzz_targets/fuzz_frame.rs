#![no_main]

use libfuzzer_sys::fuzz_target;
use openwebnet::core::codec::FrameCodec;
use openwebnet::message::OpenMessage;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Split the raw stream, then decode every frame found
    let mut codec = FrameCodec;
    let mut buf = bytes::BytesMut::from(data);
    loop {
        match codec.decode(&mut buf) {
            Ok(Some(frame)) => {
                let _ = OpenMessage::parse(&frame);
            }
            Ok(None) => break,
            Err(_) => continue,
        }
    }
});
