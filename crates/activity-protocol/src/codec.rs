use crate::{Message, MessageType, ProtocolError, Result, MAX_MESSAGE_SIZE};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Length-prefixed framing for broker [`Message`]s.
///
/// Each frame is `[u32 length, big-endian][u8 message type][bincode payload]`.
/// The length covers the type byte and the payload. Payload-less messages
/// (`NoTask`, `Ack`) carry an empty payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageCodec;

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        // Read length prefix
        if src.len() < 4 {
            return Ok(None);
        }

        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[0..4]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        if length > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(length));
        }

        // Wait for the complete frame
        if src.len() < 4 + length {
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        src.advance(4);

        // Type byte, then the rest of the frame is payload

        let msg_type_byte = src.get_u8();
        let payload = src.split_to(length - 1);

        let msg_type = MessageType::from_u8(msg_type_byte)
            .ok_or(ProtocolError::InvalidMessageType(msg_type_byte))?;

        let message = match msg_type {
            MessageType::ClaimTask => Message::ClaimTask(bincode::deserialize(&payload)?),
            MessageType::TaskAssigned => Message::TaskAssigned(bincode::deserialize(&payload)?),
            MessageType::NoTask => Message::NoTask,
            MessageType::Heartbeat => Message::Heartbeat(bincode::deserialize(&payload)?),
            MessageType::CompleteTask => Message::CompleteTask(bincode::deserialize(&payload)?),
            MessageType::FailTask => Message::FailTask(bincode::deserialize(&payload)?),
            MessageType::StartExecution => {
                Message::StartExecution(bincode::deserialize(&payload)?)
            }
            MessageType::ExecutionStarted => {
                Message::ExecutionStarted(bincode::deserialize(&payload)?)
            }
            MessageType::StopExecution => Message::StopExecution(bincode::deserialize(&payload)?),
            MessageType::Ack => Message::Ack,
            MessageType::Nack => Message::Nack(bincode::deserialize(&payload)?),
        };

        Ok(Some(message))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let payload = match &item {
            Message::ClaimTask(req) => bincode::serialize(req)?,
            Message::TaskAssigned(resp) => bincode::serialize(resp)?,
            Message::Heartbeat(req) => bincode::serialize(req)?,
            Message::CompleteTask(req) => bincode::serialize(req)?,
            Message::FailTask(req) => bincode::serialize(req)?,
            Message::StartExecution(req) => bincode::serialize(req)?,
            Message::ExecutionStarted(resp) => bincode::serialize(resp)?,
            Message::StopExecution(req) => bincode::serialize(req)?,
            Message::Nack(resp) => bincode::serialize(resp)?,
            Message::NoTask | Message::Ack => Vec::new(),
        };

        // Length covers the type byte
        let total_length = 1 + payload.len();
        if total_length > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(total_length));
        }

        dst.reserve(4 + total_length);
        dst.put_u32(total_length as u32);
        dst.put_u8(item.message_type().as_u8());
        dst.put_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FailTaskRequest, HeartbeatRequest, TaskAssignedResponse};

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();

        let message = Message::FailTask(FailTaskRequest {
            token: "token 1".to_string(),
            cause: "Signal 2".to_string(),
            error: "Process terminated".to_string(),
        });

        codec.encode(message.clone(), &mut buffer).unwrap();
        let decoded = codec.decode(&mut buffer).unwrap();

        assert_eq!(decoded, Some(message));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_payloadless_messages() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();

        codec.encode(Message::NoTask, &mut buffer).unwrap();
        codec.encode(Message::Ack, &mut buffer).unwrap();
        assert_eq!(buffer.len(), 10);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(Message::NoTask));
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(Message::Ack));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_partial_message() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();

        let message = Message::TaskAssigned(TaskAssignedResponse {
            token: "token 1".to_string(),
            input: r#"{"key": "value"}"#.to_string(),
        });
        codec.encode(message.clone(), &mut buffer).unwrap();

        let full_len = buffer.len();
        let rest = buffer.split_off(full_len / 2);

        assert!(codec.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&rest);
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(message));
    }

    #[test]
    fn test_invalid_message_type() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();
        buffer.put_u32(1);
        buffer.put_u8(42);

        match codec.decode(&mut buffer) {
            Err(ProtocolError::InvalidMessageType(42)) => {}
            other => panic!("Expected InvalidMessageType, got {:?}", other),
        }
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();
        buffer.put_u32((MAX_MESSAGE_SIZE + 1) as u32);
        buffer.put_u8(MessageType::Heartbeat.as_u8());

        assert!(matches!(
            codec.decode(&mut buffer),
            Err(ProtocolError::MessageTooLarge(_))
        ));

        let mut out = BytesMut::new();
        let huge = Message::Heartbeat(HeartbeatRequest {
            token: "x".repeat(MAX_MESSAGE_SIZE),
        });
        assert!(matches!(
            codec.encode(huge, &mut out),
            Err(ProtocolError::MessageTooLarge(_))
        ));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let mut codec = MessageCodec;
        let mut buffer = BytesMut::new();
        buffer.put_u32(0);

        assert!(matches!(codec.decode(&mut buffer), Err(ProtocolError::EmptyFrame)));
    }
}
