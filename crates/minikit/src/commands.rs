use shared::{
    domain::{CommandId, CorrelationId, EventName, Network},
    protocol::{OutboundMessage, PayCommandInput, PayCommandPayload, PaymentResponse},
};
use tracing::error;

use crate::{
    correlator::CorrelatedResponse,
    error::{CommandError, TriggerError},
    validation::validate_payment,
    MiniKit,
};

pub type PayResponse = CorrelatedResponse<PayCommandPayload, PaymentResponse>;

impl MiniKit {
    /// Sends a `pay` command without waiting for the host's answer. Returns
    /// the payload that was sent, or `None` if validation or sending failed.
    pub fn pay(&self, input: PayCommandInput) -> Option<PayCommandPayload> {
        match self.send_pay(input, None) {
            Ok(payload) => Some(payload),
            Err(err) => {
                error!("'pay' command failed: {err}");
                None
            }
        }
    }

    /// Sends a `pay` command and waits for the matching `payment-response`.
    pub async fn pay_async(&self, input: PayCommandInput) -> Result<PayResponse, CommandError> {
        if !self.is_installed() {
            error!("'pay' command unavailable: MiniKit not installed");
            return Err(CommandError::NotInstalled);
        }

        self.correlator
            .await_command(EventName::PaymentResponse, CommandId::Pay, |correlation_id| {
                self.send_pay(input, correlation_id)
            })
            .await
            .and_then(|response| response.decode(EventName::PaymentResponse))
            .inspect_err(|err| error!("Async pay command failed: {err}"))
    }

    fn send_pay(
        &self,
        input: PayCommandInput,
        correlation_id: Option<CorrelationId>,
    ) -> Result<PayCommandPayload, TriggerError> {
        validate_payment(&input)?;
        let payload = input.into_payload(Network::Kilt);
        self.transport.send(&OutboundMessage {
            command: CommandId::Pay,
            payload: &payload,
            correlation_id,
        })?;
        Ok(payload)
    }
}
