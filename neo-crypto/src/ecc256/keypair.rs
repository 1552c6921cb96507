use p256::{
    elliptic_curve::rand_core::{CryptoRng, RngCore},
    SecretKey as P256SecretKey,
};

use super::{KeyError, PrivateKey, PublicKey};

#[derive(Clone, Debug)]
pub struct Keypair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl Keypair {
    #[inline]
    pub fn from_private(private_key: PrivateKey) -> Result<Self, KeyError> {
        let secret = P256SecretKey::from_slice(private_key.as_be_bytes())
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_p256(&secret.public_key())?;
        Ok(Self {
            private_key,
            public_key,
        })
    }

    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        loop {
            let secret = P256SecretKey::random(&mut *rng);
            let private_key = PrivateKey::new(secret.to_bytes().into());
            // A random scalar always maps to a finite point.
            if let Ok(public_key) = PublicKey::from_p256(&secret.public_key()) {
                return Self {
                    private_key,
                    public_key,
                };
            }
        }
    }
}
