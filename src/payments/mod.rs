pub mod gateway;

pub use gateway::{
    verify_signature, FakeGateway, GatewayOrder, HttpGatewayClient, PaymentGateway,
};
